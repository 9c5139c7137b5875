//! Error types and handling for `WetterMail`
//!
//! Each stage of a notification run has its own error type so callers can
//! tell a broken settings file from a rejected password. `WetterMailError`
//! wraps them all for code that only needs to report a failure.

use std::path::PathBuf;
use thiserror::Error;

/// Settings storage and application configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings file exists but could not be read
    #[error("Failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file exists but is not a valid settings record
    #[error("Settings file {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The settings record could not be serialized
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The settings file could not be written
    #[error("Failed to write settings file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A field needed for sending is empty
    #[error("Settings are incomplete: '{field}' is not set")]
    Incomplete { field: &'static str },

    /// A save was requested but nothing trustworthy could be written
    #[error("Settings were not saved: {reason}")]
    NotSaved { reason: String },

    /// Application configuration failed validation
    #[error("Configuration error: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    /// Create a new validation failure for application configuration
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Key file and credential encryption errors
#[derive(Error, Debug)]
pub enum CredentialError {
    /// No key file exists yet
    #[error("Credential key not found at {}", path.display())]
    KeyMissing { path: PathBuf },

    /// The key file has the wrong size
    #[error("Credential key at {} is invalid (expected {expected} bytes, found {found})", path.display())]
    KeyInvalid {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    /// Reading or writing the key file failed
    #[error("Key file I/O error at {}: {source}", path.display())]
    KeyIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No credential has been stored in the settings yet
    #[error("No mail credential has been configured")]
    NotConfigured,

    /// Ciphertext too short to hold a nonce and tag
    #[error("Encrypted credential is malformed")]
    Malformed,

    /// Wrong key, tampered or truncated ciphertext
    #[error("Encrypted credential failed authentication")]
    Authentication,

    /// Decrypted bytes were not UTF-8
    #[error("Decrypted credential is not valid text")]
    Encoding,

    /// Encryption itself failed
    #[error("Failed to encrypt credential")]
    Encrypt,
}

/// Invalid weather observation fields
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Humidity must be between 0 and 100, got {0}")]
    Humidity(f64),

    #[error("Temperature must be a finite number, got {0}")]
    Temperature(f64),

    #[error("Wind speed must be a finite non-negative number, got {0}")]
    WindSpeed(f64),
}

/// Failures reported by a weather fetcher
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Weather provider error: {0}")]
    Provider(String),

    #[error("Weather request timed out")]
    Timeout,
}

/// Failures reported by a mail sender
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SendError {
    #[error("Mail server rejected the credentials: {0}")]
    AuthRejected(String),

    #[error("Mail network error: {0}")]
    Network(String),

    #[error("Mail server rejected the recipient: {0}")]
    RecipientRejected(String),

    #[error("Failed to build mail message: {0}")]
    Message(String),
}

/// Main error type for `WetterMail`
#[derive(Error, Debug)]
pub enum WetterMailError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Send(#[from] SendError),
}

impl WetterMailError {
    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            WetterMailError::Config(ConfigError::Incomplete { field }) => {
                format!("Please fill in '{field}' before sending.")
            }
            WetterMailError::Config(_) => {
                "Configuration error. Please check your settings file.".to_string()
            }
            WetterMailError::Credential(CredentialError::NotConfigured) => {
                "No mail password is stored yet. Please enter it and save.".to_string()
            }
            WetterMailError::Credential(_) => {
                "The stored mail password could not be decrypted. Please enter it again."
                    .to_string()
            }
            WetterMailError::Validation(e) => format!("Invalid weather data: {e}"),
            WetterMailError::Fetch(FetchError::NotFound(location)) => {
                format!("The weather service does not know '{location}'.")
            }
            WetterMailError::Fetch(_) => {
                "Unable to reach the weather service. Please check your internet connection."
                    .to_string()
            }
            WetterMailError::Send(SendError::AuthRejected(_)) => {
                "The mail server rejected the sender address or password.".to_string()
            }
            WetterMailError::Send(e) => format!("Sending the mail failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err: WetterMailError = FetchError::Timeout.into();
        assert!(matches!(err, WetterMailError::Fetch(FetchError::Timeout)));

        let err: WetterMailError = CredentialError::Authentication.into();
        assert!(matches!(err, WetterMailError::Credential(_)));
    }

    #[test]
    fn test_user_messages() {
        let err = WetterMailError::from(ConfigError::Incomplete { field: "location" });
        assert!(err.user_message().contains("location"));

        let err = WetterMailError::from(SendError::AuthRejected("535".into()));
        assert!(err.user_message().contains("password"));

        let err = WetterMailError::from(FetchError::NotFound("Atlantis".into()));
        assert!(err.user_message().contains("Atlantis"));
    }

    #[test]
    fn test_config_error_display_names_path() {
        let err = ConfigError::Write {
            path: PathBuf::from("/tmp/settings.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/settings.toml"));
    }
}
