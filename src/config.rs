//! Application configuration for `WetterMail`
//!
//! Provider, mail server, storage locations and logging are read from an
//! optional TOML file plus `WETTERMAIL_*` environment variables. The user's
//! own settings (location, addresses, credential) live in the settings file
//! managed by [`crate::settings::SettingsStore`].

use crate::error::ConfigError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const APP_DIR: &str = "wettermail";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Weather API configuration
    #[serde(default)]
    pub weather: WeatherConfig,
    /// Outgoing mail server
    #[serde(default)]
    pub smtp: SmtpConfig,
    /// Settings and key file locations
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key
    pub api_key: Option<String>,
    /// Base URL for weather API
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_weather_timeout")]
    pub timeout_seconds: u32,
}

/// Transport security for the SMTP connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS (port 587)
    #[default]
    Starttls,
    /// TLS from the first byte (port 465)
    Tls,
}

/// Outgoing mail server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub security: SmtpSecurity,
    #[serde(default = "default_smtp_timeout")]
    pub timeout_seconds: u32,
}

/// Where the settings record and the credential key are kept
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub settings_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_weather_timeout() -> u32 {
    10
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout() -> u32 {
    30
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
            timeout_seconds: default_weather_timeout(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            security: SmtpSecurity::default(),
            timeout_seconds: default_smtp_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl StorageConfig {
    /// Settings file, defaulting to `<config dir>/wettermail/settings.toml`
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(|| AppConfig::app_dir().join("settings.toml"))
    }

    /// Key file, defaulting to `<config dir>/wettermail/credential.key`
    #[must_use]
    pub fn key_path(&self) -> PathBuf {
        self.key_path
            .clone()
            .unwrap_or_else(|| AppConfig::app_dir().join("credential.key"))
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| Self::app_dir().join("wettermail.toml"));

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // WETTERMAIL_WEATHER__API_KEY, WETTERMAIL_SMTP__PORT, ...
        builder = builder.add_source(
            Environment::with_prefix("WETTERMAIL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| format!("Failed to build configuration from {}", config_file.display()))?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Directory holding the config, settings and key files
    #[must_use]
    pub fn app_dir() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Apply default values to empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_weather_timeout();
        }
        if self.smtp.host.is_empty() {
            self.smtp.host = default_smtp_host();
        }
        if self.smtp.port == 0 {
            self.smtp.port = default_smtp_port();
        }
        if self.smtp.timeout_seconds == 0 {
            self.smtp.timeout_seconds = default_smtp_timeout();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_api_key()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn validate_api_key(&self) -> Result<(), ConfigError> {
        if let Some(api_key) = &self.weather.api_key {
            if api_key.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "Weather API key cannot be empty if provided. Either remove it or provide a valid key.",
                ));
            }

            if api_key.len() > 100 {
                return Err(ConfigError::invalid(
                    "Weather API key appears to be invalid (too long). Please check your API key.",
                ));
            }
        }

        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<(), ConfigError> {
        if self.weather.timeout_seconds > 300 {
            return Err(ConfigError::invalid(
                "Weather API timeout cannot exceed 300 seconds",
            ));
        }

        if self.smtp.timeout_seconds > 300 {
            return Err(ConfigError::invalid("SMTP timeout cannot exceed 300 seconds"));
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<(), ConfigError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::invalid(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            )));
        }

        if !self.weather.base_url.starts_with("http://")
            && !self.weather.base_url.starts_with("https://")
        {
            return Err(ConfigError::invalid(
                "Weather API base URL must be a valid HTTP or HTTPS URL",
            ));
        }

        if self.smtp.host.contains(char::is_whitespace) {
            return Err(ConfigError::invalid("SMTP host must not contain whitespace"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.weather.base_url, "https://api.openweathermap.org/data/2.5");
        assert_eq!(config.weather.timeout_seconds, 10);
        assert_eq!(config.smtp.host, "smtp.gmail.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.security, SmtpSecurity::Starttls);
        assert_eq!(config.logging.level, "warn");
        assert!(config.weather.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = AppConfig::default();
        config.weather.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));
    }

    #[test]
    fn test_config_validation_empty_api_key() {
        let mut config = AppConfig::default();
        config.weather.api_key = Some("  ".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_apply_defaults_fills_empty_values() {
        let mut config = AppConfig::default();
        config.smtp.host = String::new();
        config.smtp.port = 0;
        config.logging.format = String::new();
        config.apply_defaults();
        assert_eq!(config.smtp.host, "smtp.gmail.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wettermail.toml");
        fs::write(
            &path,
            r#"
[weather]
api_key = "file_key_12345"

[smtp]
host = "mail.example.com"
port = 465
security = "tls"

[storage]
settings_path = "/tmp/wettermail-test/settings.toml"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_path(Some(path)).unwrap();
        assert_eq!(config.weather.api_key.as_deref(), Some("file_key_12345"));
        assert_eq!(config.weather.timeout_seconds, 10);
        assert_eq!(config.smtp.host, "mail.example.com");
        assert_eq!(config.smtp.port, 465);
        assert_eq!(config.smtp.security, SmtpSecurity::Tls);
        assert_eq!(
            config.storage.settings_path(),
            PathBuf::from("/tmp/wettermail-test/settings.toml")
        );
        assert!(config.storage.key_path().ends_with("credential.key"));
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wettermail.toml");
        fs::write(&path, "[logging]\nformat = \"xml\"\n").unwrap();
        assert!(AppConfig::load_from_path(Some(path)).is_err());
    }

    #[test]
    fn test_default_paths() {
        let storage = StorageConfig::default();
        assert!(storage.settings_path().to_string_lossy().contains("wettermail"));
        assert!(storage.settings_path().ends_with("settings.toml"));
        assert!(storage.key_path().ends_with("credential.key"));
    }
}
