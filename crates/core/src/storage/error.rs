//! Storage error types.

use thiserror::Error;

use dossier_shared::AppError;

use crate::cancel::Cancelled;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No file, or an empty file, was supplied to a store request.
    #[error("no file was provided")]
    NoFile,

    /// File size exceeds maximum allowed.
    #[error("file size {size} bytes exceeds maximum allowed {max} bytes")]
    FileTooLarge {
        /// Actual file size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// The configuration record does not allow the requested operation.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// The configuration record could not be read.
    #[error("configuration record unavailable: {0}")]
    ConfigSource(String),

    /// Remote provider rejected or failed the operation.
    #[error("remote storage error: {message}")]
    Backend {
        /// Provider or transport message.
        message: String,
        /// Whether the caller may try again.
        retryable: bool,
    },

    /// File not found under the configured or the default root.
    #[error("file not found: {filename}")]
    NotFound {
        /// Requested filename.
        filename: String,
    },

    /// Filename is not one this service could have generated.
    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    /// The caller cancelled the operation before the backend confirmed it.
    #[error("storage operation cancelled")]
    Cancelled,

    /// Local filesystem operation error.
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Create a file too large error.
    #[must_use]
    pub fn file_too_large(size: u64, max: u64) -> Self {
        Self::FileTooLarge { size, max }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a backend error.
    #[must_use]
    pub fn backend(msg: impl Into<String>, retryable: bool) -> Self {
        Self::Backend {
            message: msg.into(),
            retryable,
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(filename: impl Into<String>) -> Self {
        Self::NotFound {
            filename: filename.into(),
        }
    }

    /// Create an operation error.
    #[must_use]
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Whether the caller may retry the same operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { retryable: true, .. })
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        Self::Operation(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Operation(err.to_string())
    }
}

impl From<Cancelled> for StorageError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        match err {
            StorageError::NoFile | StorageError::InvalidFilename(_) => Self::Validation(message),
            StorageError::FileTooLarge { .. } => Self::PayloadTooLarge(message),
            StorageError::Configuration(_) => Self::Configuration(message),
            StorageError::Backend {
                retryable: true, ..
            } => Self::Unavailable(message),
            StorageError::Backend {
                retryable: false, ..
            } => Self::ExternalService(message),
            StorageError::NotFound { .. } => Self::NotFound(message),
            StorageError::Cancelled => Self::Cancelled(message),
            StorageError::ConfigSource(_) => Self::Database(message),
            StorageError::Operation(_) => Self::Internal(message),
        }
    }
}
