//! Outgoing email over SMTP.
//!
//! Uses `lettre` for SMTP transport. The SMTP server is not process
//! configuration: settings come from the configuration record at send time, so
//! a transport is built (and a session opened) per message.

use std::future::Future;
use std::time::Duration;

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EmailIdentity;

/// Email service errors.
#[derive(Debug, Error)]
pub enum EmailError {
    /// Failed to build email message.
    #[error("Failed to build email: {0}")]
    BuildError(String),
    /// Failed to send email.
    #[error("Failed to send email: {0}")]
    SendError(String),
    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// SMTP connection settings taken from the configuration record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    /// SMTP server host. Blank means SMTP is not configured.
    pub host: String,
    /// SMTP server port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Implicit TLS from the first byte (usually port 465). When false the
    /// session upgrades with STARTTLS if the server offers it.
    #[serde(default)]
    pub secure: bool,
    /// SMTP username. Blank disables authentication.
    #[serde(default)]
    pub user: String,
    /// SMTP password.
    #[serde(default)]
    pub password: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            secure: false,
            user: String::new(),
            password: String::new(),
        }
    }
}

impl SmtpSettings {
    /// Whether a host is set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
    }
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("password", &"[hidden]")
            .finish()
    }
}

/// A file attached to an outgoing email.
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    /// Filename shown to the recipient.
    pub filename: String,
    /// MIME type of the content.
    pub content_type: String,
    /// Raw file content.
    pub content: Vec<u8>,
}

/// A single plain-text message with at most one attachment.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    /// Recipient display name.
    pub to_name: Option<String>,
    /// Recipient address.
    pub to_email: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Optional attachment.
    pub attachment: Option<EmailAttachment>,
}

/// Delivers one message using the given SMTP settings.
pub trait MailTransport: Send + Sync {
    /// Send `email` through the server described by `settings`.
    fn deliver(
        &self,
        settings: &SmtpSettings,
        email: OutgoingEmail,
    ) -> impl Future<Output = Result<(), EmailError>> + Send;
}

/// SMTP mail transport.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    identity: EmailIdentity,
    timeout: Duration,
}

impl SmtpMailer {
    /// Default SMTP command timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a new mailer sending as `identity`.
    #[must_use]
    pub const fn new(identity: EmailIdentity) -> Self {
        Self {
            identity,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Set the SMTP command timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Creates an SMTP transport for a single send.
    fn create_transport(
        &self,
        settings: &SmtpSettings,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
        let builder = if settings.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| EmailError::SendError(e.to_string()))?
        } else {
            let params = TlsParameters::new(settings.host.clone())
                .map_err(|e| EmailError::SendError(e.to_string()))?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                .tls(Tls::Opportunistic(params))
        };

        let mut builder = builder.port(settings.port).timeout(Some(self.timeout));
        if !settings.user.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.user.clone(),
                settings.password.clone(),
            ));
        }

        Ok(builder.build())
    }

    /// Builds the MIME message for `email`.
    ///
    /// # Errors
    ///
    /// Returns an error if an address or the attachment content type is invalid.
    pub fn build_message(&self, email: &OutgoingEmail) -> Result<Message, EmailError> {
        let from = format!("{} <{}>", self.identity.from_name, self.identity.from_email)
            .parse::<Mailbox>()
            .map_err(|e| EmailError::InvalidAddress(format!("{e}")))?;

        let to = match &email.to_name {
            Some(name) if !name.trim().is_empty() => format!("{name} <{}>", email.to_email),
            _ => email.to_email.clone(),
        }
        .parse::<Mailbox>()
        .map_err(|e| EmailError::InvalidAddress(format!("{e}")))?;

        let builder = Message::builder().from(from).to(to).subject(&email.subject);

        let message = match &email.attachment {
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(email.body.clone()),
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|e| EmailError::BuildError(e.to_string()))?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(email.body.clone()))
                        .singlepart(
                            Attachment::new(attachment.filename.clone())
                                .body(attachment.content.clone(), content_type),
                        ),
                )
            }
        };

        message.map_err(|e| EmailError::BuildError(e.to_string()))
    }
}

impl MailTransport for SmtpMailer {
    async fn deliver(&self, settings: &SmtpSettings, email: OutgoingEmail) -> Result<(), EmailError> {
        let message = self.build_message(&email)?;
        let transport = self.create_transport(settings)?;

        transport
            .send(message)
            .await
            .map_err(|e| EmailError::SendError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
#[path = "email_tests.rs"]
mod tests;
