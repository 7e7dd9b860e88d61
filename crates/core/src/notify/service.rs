//! Notifier: configured-check, compose, dispatch.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use dossier_shared::{EmailAttachment, MailTransport, OutgoingEmail};

use super::error::NotifyError;
use crate::cancel::{CancellationToken, run_cancellable};
use crate::storage::{InboundFile, LocalBackend, StorageConfig, StoredDocument, StoredLocation};

/// Replaced by the recipient's name.
pub const NAME_PLACEHOLDER: &str = "{{name}}";

/// Replaced by the viewer URL (remote) or the attachment name (local).
pub const LINK_PLACEHOLDER: &str = "{{link}}";

/// A notification recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Display name.
    pub name: String,
    /// Email address on file, if any.
    #[serde(default)]
    pub email: Option<String>,
}

impl Contact {
    /// Create a contact.
    #[must_use]
    pub fn new(name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            name: name.into(),
            email,
        }
    }

    /// The email address, if present and not blank.
    #[must_use]
    pub fn email_address(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

/// Sends stored documents to contacts.
#[derive(Debug, Clone)]
pub struct Notifier<M> {
    mailer: M,
    local: LocalBackend,
}

impl<M: MailTransport> Notifier<M> {
    /// Create a notifier over `mailer`, reading local attachments through `local`.
    #[must_use]
    pub fn new(mailer: M, local: LocalBackend) -> Self {
        Self { mailer, local }
    }

    /// Email `document` to `recipient`.
    ///
    /// One SMTP session per call and no retry. Preconditions are checked
    /// before any file or network I/O.
    ///
    /// # Errors
    ///
    /// - [`NotifyError::SmtpNotConfigured`] if the record has no SMTP host
    /// - [`NotifyError::RecipientMissing`] if the recipient has no address
    /// - [`NotifyError::Attachment`] if a local document is not under a storage root
    /// - [`NotifyError::Dispatch`] if the SMTP server fails the send
    /// - [`NotifyError::Cancelled`] if `cancel` fires first
    #[instrument(skip_all, fields(backend = document.backend_type().as_str(), external_id = document.external_id()))]
    pub async fn send(
        &self,
        document: &StoredDocument,
        recipient: &Contact,
        subject: &str,
        body_template: &str,
        config: &StorageConfig,
        cancel: &CancellationToken,
    ) -> Result<(), NotifyError> {
        let smtp = config.smtp().ok_or(NotifyError::SmtpNotConfigured)?;
        let to_email = recipient
            .email_address()
            .ok_or_else(|| NotifyError::recipient_missing(&recipient.name))?;

        run_cancellable(cancel, async {
            let email = compose(
                document,
                recipient,
                to_email,
                subject,
                body_template,
                &self.local,
                config.configured_root(),
            )
            .await?;
            self.mailer.deliver(smtp, email).await?;
            Ok::<_, NotifyError>(())
        })
        .await?;

        info!(recipient = %to_email, "Notification sent");
        Ok(())
    }
}

/// Read a local document's bytes from the configured or default root.
///
/// The recorded path is never opened directly. Its file name must match the
/// stored name, which is then resolved under the storage roots.
async fn load_local(
    local: &LocalBackend,
    filename: &str,
    local_path: &Path,
    configured_root: Option<&str>,
) -> Result<Vec<u8>, NotifyError> {
    if local_path.file_name().and_then(|name| name.to_str()) != Some(filename) {
        return Err(NotifyError::Attachment(format!(
            "{filename}: recorded path does not match the stored name"
        )));
    }

    let resolved = local
        .resolve(filename, configured_root)
        .await
        .map_err(|e| NotifyError::Attachment(format!("{filename}: {e}")))?;
    debug!(path = %resolved.path.display(), "Resolved attachment");

    Ok(resolved.content.to_vec())
}

/// Build the message for `document`.
///
/// Local documents are attached after resolving them under `local`'s roots;
/// remote documents are linked.
///
/// # Errors
///
/// Returns [`NotifyError::Attachment`] if a local file is not under either root.
pub async fn compose(
    document: &StoredDocument,
    recipient: &Contact,
    to_email: &str,
    subject: &str,
    body_template: &str,
    local: &LocalBackend,
    configured_root: Option<&str>,
) -> Result<OutgoingEmail, NotifyError> {
    let body = body_template.replace(NAME_PLACEHOLDER, &recipient.name);

    let (body, attachment) = match &document.location {
        StoredLocation::Local {
            filename,
            local_path,
            ..
        } => {
            let content = load_local(local, filename, local_path, configured_root).await?;
            let attachment_name = if document.original_name.trim().is_empty() {
                filename.clone()
            } else {
                document.original_name.clone()
            };
            let content_type = if document.mime_type.trim().is_empty() {
                InboundFile::DEFAULT_MIME_TYPE.to_string()
            } else {
                document.mime_type.clone()
            };
            (
                body.replace(LINK_PLACEHOLDER, &attachment_name),
                Some(EmailAttachment {
                    filename: attachment_name,
                    content_type,
                    content,
                }),
            )
        }
        StoredLocation::Remote { access_url, .. } => {
            let body = if body.contains(LINK_PLACEHOLDER) {
                body.replace(LINK_PLACEHOLDER, access_url)
            } else {
                format!("{body}\n\n{access_url}")
            };
            (body, None)
        }
    };

    Ok(OutgoingEmail {
        to_name: Some(recipient.name.clone()),
        to_email: to_email.to_string(),
        subject: subject.to_string(),
        body,
        attachment,
    })
}
