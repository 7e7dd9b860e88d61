//! Notification error types.

use thiserror::Error;

use dossier_shared::{AppError, EmailError};

use crate::cancel::Cancelled;

/// Notification errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The configuration record has no SMTP host.
    #[error("SMTP is not configured")]
    SmtpNotConfigured,

    /// The recipient has no email address on file.
    #[error("recipient {name} has no email address")]
    RecipientMissing {
        /// Recipient display name.
        name: String,
    },

    /// Sender, recipient, or message content was rejected while composing.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The local file to attach could not be read.
    #[error("attachment unavailable: {0}")]
    Attachment(String),

    /// The SMTP server refused or failed the send.
    #[error("email dispatch failed: {0}")]
    Dispatch(String),

    /// The caller cancelled before the send completed.
    #[error("notification cancelled")]
    Cancelled,
}

impl NotifyError {
    /// Create a recipient missing error.
    #[must_use]
    pub fn recipient_missing(name: impl Into<String>) -> Self {
        Self::RecipientMissing { name: name.into() }
    }
}

impl From<EmailError> for NotifyError {
    fn from(err: EmailError) -> Self {
        match err {
            EmailError::BuildError(msg) | EmailError::InvalidAddress(msg) => {
                Self::InvalidMessage(msg)
            }
            EmailError::SendError(msg) => Self::Dispatch(msg),
        }
    }
}

impl From<Cancelled> for NotifyError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        let message = err.to_string();
        match err {
            NotifyError::SmtpNotConfigured => Self::Configuration(message),
            NotifyError::RecipientMissing { .. } => Self::BusinessRule(message),
            NotifyError::InvalidMessage(_) => Self::Validation(message),
            NotifyError::Attachment(_) => Self::NotFound(message),
            NotifyError::Dispatch(_) => Self::ExternalService(message),
            NotifyError::Cancelled => Self::Cancelled(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_error_conversion() {
        assert!(matches!(
            NotifyError::from(EmailError::InvalidAddress("bad".into())),
            NotifyError::InvalidMessage(_)
        ));
        assert!(matches!(
            NotifyError::from(EmailError::SendError("554".into())),
            NotifyError::Dispatch(_)
        ));
    }

    #[test]
    fn test_app_error_mapping() {
        let not_configured = AppError::from(NotifyError::SmtpNotConfigured);
        assert_eq!(not_configured.status_code(), 503);
        assert_eq!(not_configured.error_code(), "CONFIGURATION_ERROR");

        assert_eq!(
            AppError::from(NotifyError::recipient_missing("Ana")).status_code(),
            422
        );
        assert_eq!(
            AppError::from(NotifyError::Dispatch("timeout".into())).status_code(),
            502
        );
    }
}
