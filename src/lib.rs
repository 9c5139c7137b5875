//! `WetterMail` - current weather and clothing advice by email
//!
//! This library loads the user's settings (with an encrypted mail
//! credential), fetches the current observation for the chosen location,
//! turns it into clothing advice and mails the report.

pub mod advisory;
pub mod config;
pub mod email;
pub mod error;
pub mod logging;
pub mod message;
pub mod models;
pub mod pipeline;
pub mod secret_box;
pub mod settings;
pub mod weather;

// Re-export core types for public API
pub use advisory::{Advisory, Severity, TemperatureBand, evaluate};
pub use config::AppConfig;
pub use email::{MailSender, SmtpMailSender};
pub use error::{
    ConfigError, CredentialError, FetchError, SendError, ValidationError, WetterMailError,
};
pub use message::{ComposedMessage, compose, compose_in};
pub use models::{Condition, Location, UnitSystem, WeatherObservation};
pub use pipeline::{NotificationPipeline, Outcome, RunReport, SettingsDraft, Stage, UserTrigger};
pub use secret_box::{Credential, CredentialKey, FileKeyStore, KeyStore};
pub use settings::{DisplayOptions, Language, Settings, SettingsStore, Verbosity};
pub use weather::{OpenWeatherMapClient, WeatherFetcher, WeatherRequest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, WetterMailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
