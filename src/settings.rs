//! User settings and their on-disk store
//!
//! The settings file is plain TOML so it can be edited by hand. The mail
//! credential is stored as base64 ciphertext and is never decrypted here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::models::{Location, UnitSystem};

const FILE_HEADER: &str = "# WetterMail settings. The credential is encrypted; edit the other fields freely.\n\n";

/// How much advice the report carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Only the main clothing item plus weather-specific extras
    Brief,
    #[default]
    Detailed,
}

/// Language of the advisory and report text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    De,
    En,
}

impl Language {
    /// Provider language code
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Language::De => "de",
            Language::En => "en",
        }
    }
}

/// Value of a display option not known to this version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Text(String),
}

/// Display preferences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayOptions {
    #[serde(default)]
    pub units: UnitSystem,
    #[serde(default)]
    pub verbosity: Verbosity,
    #[serde(default)]
    pub language: Language,
    /// Unrecognised options, kept so a save does not drop them
    #[serde(flatten)]
    pub extra: BTreeMap<String, OptionValue>,
}

/// The persisted user configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Place name or "lat,lon"
    pub location: String,
    pub recipient_address: String,
    pub sender_address: String,
    /// Ciphertext produced by `secret_box::encrypt`, empty when unset
    #[serde(default, with = "base64_bytes")]
    pub encrypted_credential: Vec<u8>,
    #[serde(default)]
    pub display: DisplayOptions,
}

impl Settings {
    #[must_use]
    pub fn location(&self) -> Location {
        Location::parse(&self.location)
    }

    #[must_use]
    pub fn has_credential(&self) -> bool {
        !self.encrypted_credential.is_empty()
    }

    /// First field that must be filled in before a report can be sent
    #[must_use]
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.location.trim().is_empty() {
            Some("location")
        } else if self.recipient_address.trim().is_empty() {
            Some("recipient_address")
        } else if self.sender_address.trim().is_empty() {
            Some("sender_address")
        } else {
            None
        }
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.trim())
            .map_err(serde::de::Error::custom)
    }
}

/// Reads and writes [`Settings`] at a fixed path
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the settings.
    ///
    /// A missing file yields default settings; an unreadable or corrupt one
    /// is an error.
    #[tracing::instrument(name = "load_settings", level = "debug", skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file yet, using defaults");
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        toml::from_str(&text).map_err(|source| ConfigError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the settings file with `settings`.
    ///
    /// The record is written to a temporary file in the same directory and
    /// renamed over the old one, so readers see either the old or the new
    /// record in full.
    #[tracing::instrument(name = "save_settings", level = "debug", skip(self, settings), fields(path = %self.path.display()))]
    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let body = toml::to_string_pretty(settings)?;

        write_atomic(&self.path, &[FILE_HEADER.as_bytes(), body.as_bytes()]).map_err(|source| {
            ConfigError::Write {
                path: self.path.clone(),
                source,
            }
        })?;

        info!("Saved settings");
        Ok(())
    }
}

/// Replace `path` with `chunks` via a synced temp file in the same directory.
///
/// The directory is synced after the rename so the new entry survives a
/// crash.
pub(crate) fn write_atomic(path: &Path, chunks: &[&[u8]]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut staging = tempfile::NamedTempFile::new_in(&dir)?;
    for chunk in chunks {
        staging.write_all(chunk)?;
    }
    staging.as_file().sync_all()?;
    staging.persist(path).map_err(|e| e.error)?;

    fsync_dir(&dir)
}

fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let dir = fs::File::open(dir)?;
        dir.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_settings() -> Settings {
        Settings {
            location: "51.4344,6.7623".to_string(),
            recipient_address: "receiver@example.com".to_string(),
            sender_address: "sender@example.com".to_string(),
            encrypted_credential: vec![0, 1, 2, 254, 255, 42],
            display: DisplayOptions {
                units: UnitSystem::Imperial,
                verbosity: Verbosity::Brief,
                language: Language::En,
                extra: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn test_load_absent_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        assert!(!store.exists());
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        let settings = sample_settings();

        store.save(&settings).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, settings);
        assert_eq!(loaded.encrypted_credential, vec![0, 1, 2, 254, 255, 42]);
    }

    #[test]
    fn test_save_overwrites_wholesale() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        store.save(&sample_settings()).unwrap();

        let replacement = Settings {
            location: "Duisburg".to_string(),
            ..Settings::default()
        };
        store.save(&replacement).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, replacement);
        assert!(!loaded.has_credential());
    }

    #[test]
    fn test_save_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("a").join("b").join("settings.toml"));
        store.save(&sample_settings()).unwrap();
        assert!(store.exists());
    }

    #[test]
    fn test_saved_file_is_human_editable() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        store.save(&sample_settings()).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.starts_with("# WetterMail settings"));
        assert!(text.contains("recipient_address = \"receiver@example.com\""));
        assert!(text.contains("units = \"imperial\""));
    }

    #[test]
    fn test_hand_written_file_with_extra_options() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        fs::write(
            store.path(),
            r#"
location = "Duisburg"
recipient_address = "me@example.com"
sender_address = "bot@example.com"

[display]
language = "en"
show_humidity = true
theme = "dark"
"#,
        )
        .unwrap();

        let loaded = store.load().unwrap();
        assert!(loaded.encrypted_credential.is_empty());
        assert_eq!(loaded.display.language, Language::En);
        assert_eq!(loaded.display.units, UnitSystem::Metric);
        assert_eq!(
            loaded.display.extra.get("show_humidity"),
            Some(&OptionValue::Flag(true))
        );
        assert_eq!(
            loaded.display.extra.get("theme"),
            Some(&OptionValue::Text("dark".to_string()))
        );

        store.save(&loaded).unwrap();
        assert_eq!(store.load().unwrap(), loaded);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        fs::write(store.path(), "location = [unterminated").unwrap();
        assert!(matches!(store.load(), Err(ConfigError::Corrupt { .. })));
    }

    #[test]
    fn test_missing_required_key_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        fs::write(store.path(), "location = \"Duisburg\"\n").unwrap();
        assert!(matches!(store.load(), Err(ConfigError::Corrupt { .. })));
    }

    #[test]
    fn test_invalid_ciphertext_encoding_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        fs::write(
            store.path(),
            "location = \"x\"\nrecipient_address = \"a\"\nsender_address = \"b\"\nencrypted_credential = \"not base64!\"\n",
        )
        .unwrap();
        assert!(matches!(store.load(), Err(ConfigError::Corrupt { .. })));
    }

    #[test]
    fn test_unreadable_path_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path());
        assert!(matches!(store.load(), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();
        let store = SettingsStore::new(blocker.join("settings.toml"));
        assert!(matches!(
            store.save(&sample_settings()),
            Err(ConfigError::Write { .. })
        ));
    }

    #[test]
    fn test_missing_field() {
        let mut settings = sample_settings();
        assert_eq!(settings.missing_field(), None);
        settings.sender_address = "  ".to_string();
        assert_eq!(settings.missing_field(), Some("sender_address"));
        assert_eq!(Settings::default().missing_field(), Some("location"));
    }

    #[test]
    fn test_write_atomic_leaves_only_the_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.toml");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, &[&b"new "[..], &b"record"[..]]).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new record");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
