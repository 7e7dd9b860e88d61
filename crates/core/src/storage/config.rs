//! The configuration record and the provider it is read through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use dossier_shared::SmtpSettings;

use super::error::StorageError;

/// Active storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageMode {
    /// Local filesystem under the configured (or default) root.
    #[default]
    Local,
    /// Remote object provider.
    #[serde(alias = "DRIVE")]
    Remote,
}

impl StorageMode {
    /// Convert to database string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Remote => "REMOTE",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Some(Self::Local),
            "REMOTE" | "DRIVE" => Some(Self::Remote),
            _ => None,
        }
    }
}

/// Service-account credentials for the remote provider.
///
/// Deserializes directly from a provider-issued service account JSON; fields
/// not listed here are ignored.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCredentials {
    /// Service account email (JWT issuer).
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    /// Key id placed in the JWT header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_id: Option<String>,
    /// Token endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
}

impl RemoteCredentials {
    /// Parse a service account JSON document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the JSON is malformed or incomplete.
    pub fn from_service_account_json(json: &str) -> Result<Self, StorageError> {
        let credentials: Self = serde_json::from_str(json)
            .map_err(|e| StorageError::configuration(format!("invalid service account JSON: {e}")))?;
        if !credentials.is_complete() {
            return Err(StorageError::configuration(
                "service account JSON must contain client_email and private_key",
            ));
        }
        Ok(credentials)
    }

    /// Both the issuer and the key are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.client_email.trim().is_empty() && !self.private_key.trim().is_empty()
    }
}

impl std::fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("client_email", &self.client_email)
            .field("private_key", &"[hidden]")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Placeholder written over secrets in redacted views.
pub const REDACTED: &str = "[redacted]";

/// The configuration record consumed by every operation.
///
/// Owned by an external collaborator and read fresh per operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Active backend.
    #[serde(default)]
    pub mode: StorageMode,
    /// Local root override. Absent or blank means the default root.
    #[serde(default)]
    pub local_root: Option<String>,
    /// Remote service-account credentials.
    #[serde(default)]
    pub remote_credentials: Option<RemoteCredentials>,
    /// Remote folder id uploads go into.
    #[serde(default)]
    pub remote_container_id: Option<String>,
    /// SMTP settings, needed only to send notifications.
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
}

/// Validated remote destination borrowed from a [`StorageConfig`].
#[derive(Debug, Clone, Copy)]
pub struct RemoteTarget<'a> {
    /// Credentials to authenticate with.
    pub credentials: &'a RemoteCredentials,
    /// Folder id to upload under.
    pub container_id: &'a str,
}

impl StorageConfig {
    /// A local-mode record using the default root.
    #[must_use]
    pub fn local() -> Self {
        Self::default()
    }

    /// A remote-mode record.
    #[must_use]
    pub fn remote(credentials: RemoteCredentials, container_id: impl Into<String>) -> Self {
        Self {
            mode: StorageMode::Remote,
            remote_credentials: Some(credentials),
            remote_container_id: Some(container_id.into()),
            ..Self::default()
        }
    }

    /// Set the local root override.
    #[must_use]
    pub fn with_local_root(mut self, root: impl Into<String>) -> Self {
        self.local_root = Some(root.into());
        self
    }

    /// Set SMTP settings.
    #[must_use]
    pub fn with_smtp(mut self, smtp: SmtpSettings) -> Self {
        self.smtp = Some(smtp);
        self
    }

    /// The configured root, if set and not blank.
    #[must_use]
    pub fn configured_root(&self) -> Option<&str> {
        self.local_root
            .as_deref()
            .map(str::trim)
            .filter(|root| !root.is_empty())
    }

    /// Credentials and container for remote mode.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either is missing or blank.
    pub fn remote_target(&self) -> Result<RemoteTarget<'_>, StorageError> {
        let credentials = self
            .remote_credentials
            .as_ref()
            .filter(|c| c.is_complete())
            .ok_or_else(|| {
                StorageError::configuration("REMOTE mode requires service account credentials")
            })?;

        let container_id = self
            .remote_container_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StorageError::configuration("REMOTE mode requires a container id"))?;

        Ok(RemoteTarget {
            credentials,
            container_id,
        })
    }

    /// SMTP settings if a host is set.
    #[must_use]
    pub fn smtp(&self) -> Option<&SmtpSettings> {
        self.smtp.as_ref().filter(|smtp| smtp.is_configured())
    }

    /// Copy with secrets replaced by [`REDACTED`].
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(credentials) = copy.remote_credentials.as_mut() {
            credentials.private_key = REDACTED.to_string();
        }
        if let Some(smtp) = copy.smtp.as_mut() {
            if !smtp.password.is_empty() {
                smtp.password = REDACTED.to_string();
            }
        }
        copy
    }
}

/// Source of the configuration record.
///
/// Implementations must not cache: each call reflects the latest saved record.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Read the current record.
    async fn load(&self) -> Result<StorageConfig, StorageError>;
}

/// A [`ConfigProvider`] that can also replace the record.
#[async_trait]
pub trait ConfigStore: ConfigProvider {
    /// Replace the record and return what was stored.
    async fn save(&self, config: StorageConfig) -> Result<StorageConfig, StorageError>;
}

/// In-process configuration record.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    record: RwLock<StorageConfig>,
}

impl MemoryConfigStore {
    /// Create a store holding `config`.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self {
            record: RwLock::new(config),
        }
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigStore {
    async fn load(&self) -> Result<StorageConfig, StorageError> {
        Ok(self.record.read().await.clone())
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn save(&self, config: StorageConfig) -> Result<StorageConfig, StorageError> {
        let mut record = self.record.write().await;
        *record = config;
        Ok(record.clone())
    }
}
