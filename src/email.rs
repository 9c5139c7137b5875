use lettre::{
    Message, Transport,
    message::{Mailbox, MultiPart},
    transport::smtp::{SmtpTransport, authentication::Credentials},
};
use std::time::Duration;

use crate::config::{SmtpConfig, SmtpSecurity};
use crate::error::SendError;
use crate::message::ComposedMessage;
use crate::secret_box::Credential;

/// Delivers a composed report
pub trait MailSender {
    fn send(
        &self,
        message: &ComposedMessage,
        sender: &str,
        recipient: &str,
        credential: &Credential,
    ) -> Result<(), SendError>;
}

impl<F> MailSender for F
where
    F: Fn(&ComposedMessage, &str, &str, &Credential) -> Result<(), SendError>,
{
    fn send(
        &self,
        message: &ComposedMessage,
        sender: &str,
        recipient: &str,
        credential: &Credential,
    ) -> Result<(), SendError> {
        self(message, sender, recipient, credential)
    }
}

/// SMTP submission with the sender address as login
pub struct SmtpMailSender {
    host: String,
    port: u16,
    security: SmtpSecurity,
    timeout: Duration,
}

impl SmtpMailSender {
    #[must_use]
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            security: config.security,
            timeout: Duration::from_secs(config.timeout_seconds.into()),
        }
    }

    fn create_mailer(&self, login: &str, credential: &Credential) -> Result<SmtpTransport, SendError> {
        let credentials = Credentials::new(login.to_string(), credential.expose().to_string());

        let builder = match self.security {
            SmtpSecurity::Starttls => SmtpTransport::starttls_relay(&self.host),
            SmtpSecurity::Tls => SmtpTransport::relay(&self.host),
        }
        .map_err(|e| SendError::Network(e.to_string()))?;

        Ok(builder
            .port(self.port)
            .credentials(credentials)
            .timeout(Some(self.timeout))
            .build())
    }
}

impl MailSender for SmtpMailSender {
    #[tracing::instrument(name = "send_mail", skip(self, message, credential), fields(host = %self.host))]
    fn send(
        &self,
        message: &ComposedMessage,
        sender: &str,
        recipient: &str,
        credential: &Credential,
    ) -> Result<(), SendError> {
        let from: Mailbox = format!("WetterMail <{sender}>")
            .parse()
            .map_err(|e| SendError::Message(format!("Invalid sender address '{sender}': {e}")))?;
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| SendError::RecipientRejected(format!("Invalid address '{recipient}': {e}")))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.text_body.clone(),
                message.html_body.clone(),
            ))
            .map_err(|e| SendError::Message(e.to_string()))?;

        let mailer = self.create_mailer(sender, credential)?;

        mailer.send(&email).map_err(|e| {
            if e.is_timeout() {
                return SendError::Network(format!("SMTP timeout: {e}"));
            }
            let code = e.status().map(|code| code.to_string());
            classify_smtp_failure(code.as_deref(), e.to_string())
        })?;

        tracing::info!("Sent weather report to {}", recipient);

        Ok(())
    }
}

/// Sort an SMTP failure by its reply code
fn classify_smtp_failure(code: Option<&str>, message: String) -> SendError {
    match code {
        Some("530" | "534" | "535") => SendError::AuthRejected(message),
        Some("550" | "551" | "553") => SendError::RecipientRejected(message),
        _ => SendError::Network(message),
    }
}
