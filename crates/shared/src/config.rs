//! Application configuration management.
//!
//! This is the process configuration (where to listen, where the database lives,
//! where the provider endpoints are). The per-operation storage record that an
//! operator can switch at runtime lives in the database and is read through
//! `dossier_core::storage::ConfigProvider` instead.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration. Absent means the configuration record is kept in memory.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    /// Local storage settings.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Remote provider endpoints.
    #[serde(default)]
    pub drive: DriveSettings,
    /// Outgoing email identity.
    #[serde(default)]
    pub email: EmailIdentity,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL (protocol + host) used to build retrieval links.
    ///
    /// When unset the base URL is derived from the request `Host` header.
    #[serde(default)]
    pub public_url: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    120
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Local storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Default root used when no configured root is set, and as the fallback
    /// location when a file is missing under the configured root.
    #[serde(default = "default_root")]
    pub default_root: String,
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            default_root: default_root(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_root() -> String {
    "uploads".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

/// Remote provider (Google Drive) endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveSettings {
    /// OAuth token endpoint used when the service account JSON carries no `token_uri`.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Media upload endpoint for file creation.
    #[serde(default = "default_upload_url")]
    pub upload_url: String,
    /// Timeout applied to each provider HTTP call, in seconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            upload_url: default_upload_url(),
            api_timeout_secs: default_api_timeout(),
        }
    }
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_upload_url() -> String {
    "https://www.googleapis.com/upload/drive/v3/files".to_string()
}

fn default_api_timeout() -> u64 {
    60
}

/// Sender identity for outgoing email.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailIdentity {
    /// Sender address.
    #[serde(default = "default_from_email")]
    pub from_email: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailIdentity {
    fn default() -> Self {
        Self {
            from_email: default_from_email(),
            from_name: default_from_name(),
        }
    }
}

fn default_from_email() -> String {
    "noreply@localhost".to_string()
}

fn default_from_name() -> String {
    "Dossier".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("DOSSIER").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
