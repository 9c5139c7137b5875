//! One end-to-end notification run
//!
//! `load -> decrypt -> fetch -> evaluate -> compose -> send -> (save)`, run
//! synchronously. The pipeline owns no global state: the settings store and
//! key store are passed in, the fetcher and sender are passed per run.

use std::fmt;
use tracing::{debug, info, warn};

use crate::advisory;
use crate::email::MailSender;
use crate::error::{ConfigError, CredentialError, WetterMailError};
use crate::message;
use crate::secret_box::{self, Credential, KeyStore};
use crate::settings::{DisplayOptions, Settings, SettingsStore};
use crate::weather::{WeatherFetcher, WeatherRequest};

/// Run states, in the order a successful run passes through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    SettingsLoaded,
    ObservationFetched,
    AdvisoryComputed,
    MessageComposed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::SettingsLoaded => "settings loaded",
            Stage::ObservationFetched => "observation fetched",
            Stage::AdvisoryComputed => "advisory computed",
            Stage::MessageComposed => "message composed",
        };
        f.write_str(name)
    }
}

/// Terminal result of a send
#[derive(Debug)]
pub enum Outcome {
    Sent,
    /// `stage` is the last state reached before `error`
    Failed {
        stage: Stage,
        error: WetterMailError,
    },
}

impl Outcome {
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Outcome::Sent)
    }
}

/// Form contents submitted by the user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsDraft {
    pub location: String,
    pub recipient_address: String,
    pub sender_address: String,
    pub display: DisplayOptions,
    /// New plaintext credential, `None` keeps the stored one
    pub credential: Option<Credential>,
}

impl SettingsDraft {
    /// Prefill a draft from stored settings (without a credential)
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            location: settings.location.clone(),
            recipient_address: settings.recipient_address.clone(),
            sender_address: settings.sender_address.clone(),
            display: settings.display.clone(),
            credential: None,
        }
    }

    /// The draft's fields on top of `base`; the stored ciphertext is kept
    #[must_use]
    pub fn apply_to(&self, base: &Settings) -> Settings {
        Settings {
            location: self.location.trim().to_string(),
            recipient_address: self.recipient_address.trim().to_string(),
            sender_address: self.sender_address.trim().to_string(),
            encrypted_credential: base.encrypted_credential.clone(),
            display: self.display.clone(),
        }
    }
}

/// What the user asked for
#[derive(Debug, Clone, Default)]
pub struct UserTrigger {
    /// Overrides the stored settings for this run
    pub draft: Option<SettingsDraft>,
    pub send_now: bool,
    pub save: bool,
}

/// Results of a run, one entry per requested action
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcome: Option<Outcome>,
    pub save: Option<Result<(), WetterMailError>>,
}

impl RunReport {
    /// True when every requested action succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.as_ref().is_none_or(Outcome::is_sent)
            && self.save.as_ref().is_none_or(Result::is_ok)
    }
}

/// Orchestrates settings, key, fetcher and sender
pub struct NotificationPipeline<'a> {
    store: &'a SettingsStore,
    keys: &'a dyn KeyStore,
}

impl<'a> NotificationPipeline<'a> {
    pub fn new(store: &'a SettingsStore, keys: &'a dyn KeyStore) -> Self {
        Self { store, keys }
    }

    /// Write default settings if there are none and make sure a key exists.
    ///
    /// Returns whether a settings file was created.
    pub fn initialize(&self) -> Result<bool, WetterMailError> {
        let created = if self.store.exists() {
            false
        } else {
            self.store.save(&Settings::default())?;
            info!("Created settings file {}", self.store.path().display());
            true
        };
        self.keys.load_or_generate()?;
        Ok(created)
    }

    /// Replace the key and forget the stored credential
    pub fn reset_key(&self) -> Result<(), WetterMailError> {
        let mut settings = self.store.load()?;
        self.keys.generate_key()?;
        settings.encrypted_credential.clear();
        self.store.save(&settings)?;
        warn!("Credential key was reset; the mail password must be entered again");
        Ok(())
    }

    /// Execute one trigger.
    ///
    /// Never panics on collaborator failures: every error lands in the
    /// returned report. A requested save runs even if the send failed.
    #[tracing::instrument(name = "pipeline_run", skip_all, fields(send = trigger.send_now, save = trigger.save))]
    pub fn run(
        &self,
        trigger: UserTrigger,
        fetcher: &dyn WeatherFetcher,
        sender: &dyn MailSender,
    ) -> RunReport {
        let mut report = RunReport::default();
        let mut load_failure = None;

        let base = match self.store.load() {
            Ok(settings) => Some(settings),
            Err(error) => {
                warn!("Settings could not be loaded: {}", error);
                load_failure = Some(error.to_string());
                if trigger.send_now {
                    report.outcome = Some(Outcome::Failed {
                        stage: Stage::Idle,
                        error: error.into(),
                    });
                }
                None
            }
        };

        if let (true, Some(base)) = (trigger.send_now, &base) {
            report.outcome = Some(self.send(base, trigger.draft.as_ref(), fetcher, sender));
        }

        match &report.outcome {
            Some(Outcome::Sent) => info!("Weather report sent"),
            Some(Outcome::Failed { stage, error }) => {
                warn!("Weather report not sent (after {}): {}", stage, error);
            }
            None => {}
        }

        if trigger.save {
            let result = match base {
                Some(base) => self.save(&base, trigger.draft.as_ref()),
                None => match trigger.draft.as_ref() {
                    Some(draft) if draft.credential.is_some() => {
                        self.save(&Settings::default(), Some(draft))
                    }
                    _ => Err(ConfigError::NotSaved {
                        reason: load_failure.unwrap_or_default(),
                    }
                    .into()),
                },
            };
            if let Err(e) = &result {
                warn!("Settings save failed: {}", e);
            }
            report.save = Some(result);
        }

        report
    }

    fn send(
        &self,
        base: &Settings,
        draft: Option<&SettingsDraft>,
        fetcher: &dyn WeatherFetcher,
        sender: &dyn MailSender,
    ) -> Outcome {
        let mut stage = Stage::SettingsLoaded;
        debug!("Pipeline stage: {}", stage);

        let settings = match draft {
            Some(draft) => draft.apply_to(base),
            None => base.clone(),
        };

        let failed = |stage: Stage, error: WetterMailError| Outcome::Failed { stage, error };

        if let Some(field) = settings.missing_field() {
            return failed(stage, ConfigError::Incomplete { field }.into());
        }

        let credential = match self.credential_for(&settings, draft) {
            Ok(credential) => credential,
            Err(e) => return failed(stage, e.into()),
        };

        let request = WeatherRequest {
            location: settings.location(),
            units: settings.display.units,
            language: settings.display.language,
        };
        let observation = match fetcher.fetch(&request) {
            Ok(observation) => observation,
            Err(e) => return failed(stage, e.into()),
        };
        stage = Stage::ObservationFetched;
        debug!("Pipeline stage: {}", stage);

        let advisory = match advisory::evaluate(&observation, &settings.display) {
            Ok(advisory) => advisory,
            Err(e) => return failed(stage, e.into()),
        };
        stage = Stage::AdvisoryComputed;
        debug!("Pipeline stage: {} ({})", stage, advisory.severity);

        let composed = message::compose(&settings.location, &observation, &advisory, &settings.display);
        stage = Stage::MessageComposed;
        debug!("Pipeline stage: {}", stage);

        match sender.send(
            &composed,
            &settings.sender_address,
            &settings.recipient_address,
            &credential,
        ) {
            Ok(()) => Outcome::Sent,
            Err(e) => failed(stage, e.into()),
        }
    }

    fn credential_for(
        &self,
        settings: &Settings,
        draft: Option<&SettingsDraft>,
    ) -> Result<Credential, CredentialError> {
        if let Some(credential) = draft.and_then(|d| d.credential.clone()) {
            return Ok(credential);
        }
        if !settings.has_credential() {
            return Err(CredentialError::NotConfigured);
        }
        let key = self.keys.load_key()?;
        secret_box::decrypt(&settings.encrypted_credential, &key)
    }

    fn save(&self, base: &Settings, draft: Option<&SettingsDraft>) -> Result<(), WetterMailError> {
        let mut settings = match draft {
            Some(draft) => draft.apply_to(base),
            None => base.clone(),
        };

        if let Some(credential) = draft.and_then(|d| d.credential.as_ref()) {
            let key = self.keys.load_or_generate()?;
            settings.encrypted_credential = secret_box::encrypt(credential.expose(), &key)?;
            debug!("Re-encrypted mail credential");
        }

        self.store.save(&settings)?;
        info!("Saved settings to {}", self.store.path().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UnitSystem;
    use crate::settings::Verbosity;

    fn stored() -> Settings {
        Settings {
            location: "Duisburg".to_string(),
            recipient_address: "to@example.com".to_string(),
            sender_address: "from@example.com".to_string(),
            encrypted_credential: vec![1, 2, 3],
            display: DisplayOptions::default(),
        }
    }

    #[test]
    fn test_draft_round_trips_settings_fields() {
        let draft = SettingsDraft::from_settings(&stored());
        assert!(draft.credential.is_none());
        assert_eq!(draft.apply_to(&stored()), stored());
    }

    #[test]
    fn test_apply_to_keeps_ciphertext_and_trims() {
        let draft = SettingsDraft {
            location: "  51.4,6.7 ".to_string(),
            recipient_address: "other@example.com".to_string(),
            sender_address: "from@example.com".to_string(),
            display: DisplayOptions {
                units: UnitSystem::Imperial,
                verbosity: Verbosity::Brief,
                ..DisplayOptions::default()
            },
            credential: Some(Credential::new("new".to_string())),
        };
        let settings = draft.apply_to(&stored());
        assert_eq!(settings.location, "51.4,6.7");
        assert_eq!(settings.recipient_address, "other@example.com");
        assert_eq!(settings.encrypted_credential, vec![1, 2, 3]);
        assert_eq!(settings.display.units, UnitSystem::Imperial);
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Idle < Stage::SettingsLoaded);
        assert!(Stage::ObservationFetched < Stage::MessageComposed);
        assert_eq!(Stage::AdvisoryComputed.to_string(), "advisory computed");
    }

    #[test]
    fn test_report_success() {
        assert!(RunReport::default().is_success());

        let report = RunReport {
            outcome: Some(Outcome::Sent),
            save: Some(Err(ConfigError::NotSaved {
                reason: "corrupt".into(),
            }
            .into())),
        };
        assert!(!report.is_success());
    }
}
