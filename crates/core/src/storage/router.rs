//! Storage router: picks a backend per call and normalizes the result.

use tracing::{info, instrument};

use super::config::{RemoteTarget, StorageConfig, StorageMode};
use super::document::{InboundFile, StoredDocument, StoredLocation};
use super::error::StorageError;
use super::local::LocalBackend;
use super::remote::RemoteBackend;
use super::retrieval::RETRIEVAL_PATH;
use crate::cancel::{CancellationToken, run_cancellable};

/// A backend selected for one store call.
enum Backend<'a> {
    Local {
        backend: &'a LocalBackend,
        configured_root: Option<&'a str>,
    },
    Remote {
        backend: &'a RemoteBackend,
        target: RemoteTarget<'a>,
    },
}

impl Backend<'_> {
    /// Perform exactly one write.
    async fn put(&self, file: &InboundFile, base_url: &str) -> Result<StoredLocation, StorageError> {
        match self {
            Self::Local {
                backend,
                configured_root,
            } => {
                let written = backend.store(file, *configured_root).await?;
                Ok(StoredLocation::Local {
                    access_url: retrieval_url(base_url, &written.filename),
                    filename: written.filename,
                    local_path: written.local_path,
                })
            }
            Self::Remote { backend, target } => {
                let uploaded = backend
                    .upload(file, target.container_id, target.credentials)
                    .await?;
                Ok(StoredLocation::Remote {
                    external_id: uploaded.external_id,
                    access_url: uploaded.access_url,
                })
            }
        }
    }
}

/// URL under the retrieval gateway for a local filename.
#[must_use]
pub fn retrieval_url(base_url: &str, filename: &str) -> String {
    format!("{}{RETRIEVAL_PATH}/{filename}", base_url.trim_end_matches('/'))
}

/// Routes store requests to the backend named by the configuration record.
#[derive(Debug, Clone)]
pub struct StorageRouter {
    local: LocalBackend,
    remote: RemoteBackend,
    max_file_size: u64,
}

impl StorageRouter {
    /// Default max file size: 10MB.
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

    /// Create a router over both backends.
    #[must_use]
    pub fn new(local: LocalBackend, remote: RemoteBackend) -> Self {
        Self {
            local,
            remote,
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Set maximum file size.
    #[must_use]
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// The local backend, shared with the retrieval gateway.
    #[must_use]
    pub fn local(&self) -> &LocalBackend {
        &self.local
    }

    /// Choose the backend for `config`.
    ///
    /// Remote mode with missing credentials is an error, never a local write.
    fn select<'a>(&'a self, config: &'a StorageConfig) -> Result<Backend<'a>, StorageError> {
        match config.mode {
            StorageMode::Local => Ok(Backend::Local {
                backend: &self.local,
                configured_root: config.configured_root(),
            }),
            StorageMode::Remote => Ok(Backend::Remote {
                backend: &self.remote,
                target: config.remote_target()?,
            }),
        }
    }

    /// Store `file` in the backend named by `config`.
    ///
    /// `base_url` (protocol + host) prefixes the retrieval URL of local files.
    /// The result is returned only after the backend confirmed the write.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NoFile`] for an empty file
    /// - [`StorageError::FileTooLarge`] above the size limit
    /// - [`StorageError::Configuration`] for remote mode without credentials or container
    /// - [`StorageError::Backend`] for remote failures
    /// - [`StorageError::Cancelled`] if `cancel` fires first
    #[instrument(skip_all, fields(mode = config.mode.as_str(), original_name = %file.original_name))]
    pub async fn store(
        &self,
        file: InboundFile,
        config: &StorageConfig,
        base_url: &str,
        cancel: &CancellationToken,
    ) -> Result<StoredDocument, StorageError> {
        if file.is_empty() {
            return Err(StorageError::NoFile);
        }
        if file.size_bytes() > self.max_file_size {
            return Err(StorageError::file_too_large(
                file.size_bytes(),
                self.max_file_size,
            ));
        }

        let backend = self.select(config)?;
        let location = run_cancellable(cancel, backend.put(&file, base_url)).await?;

        let document = StoredDocument {
            size_bytes: file.size_bytes(),
            original_name: file.original_name,
            mime_type: file.mime_type,
            location,
        };

        info!(
            backend = document.backend_type().as_str(),
            external_id = document.external_id(),
            "Document stored"
        );

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::storage::{BackendType, DriveEndpoints, RemoteCredentials};

    fn router(default_root: &std::path::Path) -> StorageRouter {
        // Unroutable endpoints: any remote call would fail, not hang.
        let remote = RemoteBackend::new(
            DriveEndpoints {
                token_url: "http://127.0.0.1:9/token".to_string(),
                upload_url: "http://127.0.0.1:9/upload".to_string(),
            },
            Duration::from_secs(2),
        )
        .expect("client");
        StorageRouter::new(LocalBackend::new(default_root), remote)
    }

    fn invoice() -> InboundFile {
        InboundFile::new("invoice.pdf", "application/pdf", vec![7u8; 2048])
    }

    #[test]
    fn test_retrieval_url() {
        assert_eq!(
            retrieval_url("http://localhost:3000/", "1-a.pdf"),
            "http://localhost:3000/uploads/1-a.pdf"
        );
    }

    #[tokio::test]
    async fn test_store_local_default_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let router = router(dir.path());

        let document = router
            .store(
                invoice(),
                &StorageConfig::local(),
                "http://localhost:3000",
                &CancellationToken::new(),
            )
            .await
            .expect("store");

        assert_eq!(document.backend_type(), BackendType::Local);
        assert_eq!(document.size_bytes, 2048);
        let path = document.local_path().expect("local path");
        assert!(path.starts_with(dir.path()));
        assert!(document.access_url().ends_with(document.external_id()));
        assert!(document.access_url().starts_with("http://localhost:3000/uploads/"));
    }

    #[tokio::test]
    async fn test_store_rejects_empty_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = router(dir.path())
            .store(
                InboundFile::new("empty.pdf", "application/pdf", Vec::new()),
                &StorageConfig::local(),
                "http://localhost",
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NoFile));
        assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 0);
    }

    #[tokio::test]
    async fn test_store_rejects_oversized_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = router(dir.path())
            .with_max_file_size(1024)
            .store(
                invoice(),
                &StorageConfig::local(),
                "http://localhost",
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::FileTooLarge { size: 2048, max: 1024 }));
    }

    #[tokio::test]
    async fn test_remote_without_credentials_never_writes_locally() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig {
            mode: StorageMode::Remote,
            remote_container_id: Some("folder".to_string()),
            ..StorageConfig::default()
        };

        let err = router(dir.path())
            .store(invoice(), &config, "http://localhost", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Configuration(_)));
        assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 0);
    }

    #[tokio::test]
    async fn test_remote_without_container_is_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig::remote(
            RemoteCredentials {
                client_email: "a@b.c".to_string(),
                private_key: "key".to_string(),
                private_key_id: None,
                token_uri: None,
            },
            "",
        );

        let err = router(dir.path())
            .store(invoice(), &config, "http://localhost", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_cancelled_store_returns_no_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = router(dir.path())
            .store(invoice(), &StorageConfig::local(), "http://localhost", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
    }

    #[tokio::test]
    async fn test_concurrent_stores_into_missing_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("not").join("yet").join("there");
        let router = router(dir.path());
        let config = StorageConfig::local().with_local_root(root.to_string_lossy());
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(
            router.store(invoice(), &config, "http://localhost", &cancel),
            router.store(invoice(), &config, "http://localhost", &cancel),
        );
        let a = a.expect("first store");
        let b = b.expect("second store");

        assert_ne!(a.external_id(), b.external_id());
        assert_eq!(std::fs::read_dir(&root).expect("list").count(), 2);
    }

    #[tokio::test]
    async fn test_mode_change_applies_to_next_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        let router = router(dir.path());
        let cancel = CancellationToken::new();
        let root_a = dir.path().join("a");
        let root_b = dir.path().join("b");

        let first = router
            .store(
                invoice(),
                &StorageConfig::local().with_local_root(root_a.to_string_lossy()),
                "http://localhost",
                &cancel,
            )
            .await
            .expect("first");
        let second = router
            .store(
                invoice(),
                &StorageConfig::local().with_local_root(root_b.to_string_lossy()),
                "http://localhost",
                &cancel,
            )
            .await
            .expect("second");

        assert!(first.local_path().expect("path").starts_with(&root_a));
        assert!(second.local_path().expect("path").starts_with(&root_b));
    }
}
