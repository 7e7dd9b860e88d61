//! Retrieval gateway for locally stored documents.
//!
//! Remote documents are served by the provider's own URL; there is no read
//! path for them here.

use bytes::Bytes;
use tracing::debug;

use super::config::StorageConfig;
use super::error::StorageError;
use super::local::LocalBackend;
use crate::cancel::{CancellationToken, run_cancellable};

/// Path prefix local access URLs are served under.
pub const RETRIEVAL_PATH: &str = "/uploads";

/// A document read back from local storage.
#[derive(Debug, Clone)]
pub struct RetrievedFile {
    /// Requested filename.
    pub filename: String,
    /// MIME type derived from the extension.
    pub content_type: &'static str,
    /// File content.
    pub content: Bytes,
}

/// Resolves stored local filenames back to bytes.
#[derive(Debug, Clone)]
pub struct RetrievalGateway {
    local: LocalBackend,
}

impl RetrievalGateway {
    /// Create a gateway over the local backend.
    #[must_use]
    pub fn new(local: LocalBackend) -> Self {
        Self { local }
    }

    /// Read `filename` using the configured root, then the default root.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if neither root holds the file,
    /// [`StorageError::InvalidFilename`] for names outside the generated
    /// alphabet, and [`StorageError::Cancelled`] if `cancel` fires first.
    pub async fn fetch(
        &self,
        filename: &str,
        config: &StorageConfig,
        cancel: &CancellationToken,
    ) -> Result<RetrievedFile, StorageError> {
        let resolved = run_cancellable(
            cancel,
            self.local.resolve(filename, config.configured_root()),
        )
        .await?;

        debug!(path = %resolved.path.display(), "Resolved stored file");

        Ok(RetrievedFile {
            filename: filename.to_string(),
            content_type: content_type_for(filename),
            content: resolved.content,
        })
    }
}

/// MIME type for a stored filename, by extension.
#[must_use]
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}
