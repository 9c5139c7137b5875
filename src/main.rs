use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use wettermail::{
    AppConfig, ComposedMessage, Credential, FetchError, FileKeyStore, Language,
    NotificationPipeline, OpenWeatherMapClient, Outcome, RunReport, SendError, Settings,
    SettingsDraft, SettingsStore, SmtpMailSender, UnitSystem, UserTrigger, Verbosity,
    WeatherObservation, WeatherRequest, logging,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Mail the current weather with clothing advice", long_about = None)]
struct Cli {
    /// Application config file (provider key, SMTP server, paths)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the settings file and credential key
    Init,
    /// Print the stored settings
    Show,
    /// Fetch the weather and send the report
    Send {
        /// Also save the given settings
        #[arg(long)]
        save: bool,
        #[command(flatten)]
        form: FormArgs,
    },
    /// Save settings without sending
    Save {
        #[command(flatten)]
        form: FormArgs,
    },
    /// Generate a new credential key and forget the stored password
    ResetKey {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Default)]
struct FormArgs {
    /// Place name or "lat,lon"
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    recipient: Option<String>,
    /// Sender address, also the SMTP login
    #[arg(long)]
    sender: Option<String>,
    #[arg(long, value_enum)]
    units: Option<UnitsArg>,
    #[arg(long, value_enum)]
    verbosity: Option<VerbosityArg>,
    #[arg(long, value_enum)]
    language: Option<LanguageArg>,
    /// Read the mail password from the first line of stdin
    #[arg(long)]
    credential_stdin: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum UnitsArg {
    Metric,
    Imperial,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum VerbosityArg {
    Brief,
    Detailed,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LanguageArg {
    De,
    En,
}

impl FormArgs {
    fn is_empty(&self) -> bool {
        self.location.is_none()
            && self.recipient.is_none()
            && self.sender.is_none()
            && self.units.is_none()
            && self.verbosity.is_none()
            && self.language.is_none()
            && !self.credential_stdin
    }

    /// Overlay the given fields on the stored settings
    fn into_draft(self, stored: &Settings) -> Result<SettingsDraft> {
        let mut draft = SettingsDraft::from_settings(stored);
        if let Some(location) = self.location {
            draft.location = location;
        }
        if let Some(recipient) = self.recipient {
            draft.recipient_address = recipient;
        }
        if let Some(sender) = self.sender {
            draft.sender_address = sender;
        }
        if let Some(units) = self.units {
            draft.display.units = match units {
                UnitsArg::Metric => UnitSystem::Metric,
                UnitsArg::Imperial => UnitSystem::Imperial,
            };
        }
        if let Some(verbosity) = self.verbosity {
            draft.display.verbosity = match verbosity {
                VerbosityArg::Brief => Verbosity::Brief,
                VerbosityArg::Detailed => Verbosity::Detailed,
            };
        }
        if let Some(language) = self.language {
            draft.display.language = match language {
                LanguageArg::De => Language::De,
                LanguageArg::En => Language::En,
            };
        }
        if self.credential_stdin {
            draft.credential = Some(read_credential()?);
        }
        Ok(draft)
    }
}

fn read_credential() -> Result<Credential> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read the mail password from stdin")?;
    let secret = line.trim_end_matches(['\r', '\n']).to_string();
    if secret.is_empty() {
        bail!("The mail password read from stdin is empty");
    }
    Ok(Credential::new(secret))
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::load_from_path(cli.config.clone())?;
    logging::init(&config.logging, cli.verbose)?;

    let store = SettingsStore::new(config.storage.settings_path());
    let keys = FileKeyStore::new(config.storage.key_path());
    let pipeline = NotificationPipeline::new(&store, &keys);

    match cli.command {
        Commands::Init => {
            let created = pipeline.initialize()?;
            if created {
                println!("Created {}", store.path().display());
            } else {
                println!("Settings already exist at {}", store.path().display());
            }
            println!("Credential key: {}", keys.path().display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show => {
            let settings = store.load()?;
            print_settings(&store, &settings);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Send { save, form } => {
            let draft = draft_from(form, &store)?;
            let fetcher = OpenWeatherMapClient::new(&config.weather)?;
            let sender = SmtpMailSender::new(&config.smtp);
            let trigger = UserTrigger {
                draft,
                send_now: true,
                save,
            };
            Ok(render(&pipeline.run(trigger, &fetcher, &sender)))
        }
        Commands::Save { form } => {
            let trigger = UserTrigger {
                draft: draft_from(form, &store)?,
                send_now: false,
                save: true,
            };
            let no_fetch = |_: &WeatherRequest| -> Result<WeatherObservation, FetchError> {
                Err(FetchError::Provider("fetching is not part of a save".to_string()))
            };
            let no_send = |_: &ComposedMessage, _: &str, _: &str, _: &Credential| -> Result<(), SendError> {
                Err(SendError::Network("sending is not part of a save".to_string()))
            };
            Ok(render(&pipeline.run(trigger, &no_fetch, &no_send)))
        }
        Commands::ResetKey { yes } => {
            if !yes {
                bail!("Resetting the key makes the stored password unreadable; pass --yes to confirm");
            }
            pipeline.reset_key()?;
            println!("New key written to {}", keys.path().display());
            println!("Enter the mail password again with `wettermail save --credential-stdin`.");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// `None` when no form field was given, so the stored settings are used as is
fn draft_from(form: FormArgs, store: &SettingsStore) -> Result<Option<SettingsDraft>> {
    if form.is_empty() {
        return Ok(None);
    }
    // a corrupt file still accepts a full form with a new password
    let stored = store.load().unwrap_or_else(|e| {
        tracing::debug!("Prefilling the form from defaults, stored settings unusable: {}", e);
        Settings::default()
    });
    form.into_draft(&stored).map(Some)
}

fn print_settings(store: &SettingsStore, settings: &Settings) {
    let unset = "(not set)";
    let or_unset = |value: &str| {
        if value.is_empty() {
            unset.to_string()
        } else {
            value.to_string()
        }
    };

    println!("Settings file: {}", store.path().display());
    println!("  Location:   {}", or_unset(&settings.location));
    println!("  Recipient:  {}", or_unset(&settings.recipient_address));
    println!("  Sender:     {}", or_unset(&settings.sender_address));
    println!(
        "  Password:   {}",
        if settings.has_credential() { "stored (encrypted)" } else { unset }
    );
    println!("  Units:      {:?}", settings.display.units);
    println!("  Verbosity:  {:?}", settings.display.verbosity);
    println!("  Language:   {}", settings.display.language.code());
    for (name, value) in &settings.display.extra {
        println!("  {name}: {value:?}");
    }
}

fn render(report: &RunReport) -> ExitCode {
    match &report.outcome {
        Some(Outcome::Sent) => println!("Weather report sent."),
        Some(Outcome::Failed { stage, error }) => {
            eprintln!("Weather report not sent: {}", error.user_message());
            eprintln!("  ({stage}: {error})");
        }
        None => {}
    }

    match &report.save {
        Some(Ok(())) => println!("Settings saved."),
        Some(Err(error)) => {
            eprintln!("Settings not saved: {}", error.user_message());
            eprintln!("  ({error})");
        }
        None => {}
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
