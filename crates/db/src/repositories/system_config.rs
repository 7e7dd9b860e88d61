//! Configuration record repository.
//!
//! Backs the core [`ConfigProvider`]/[`ConfigStore`] contract with the
//! single-row `system_config` table. Nothing is cached: every `load` queries.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, Set, sea_query::OnConflict};
use tracing::debug;

use dossier_core::storage::{
    ConfigProvider, ConfigStore, RemoteCredentials, StorageConfig, StorageError, StorageMode,
};
use dossier_shared::SmtpSettings;

use crate::entities::system_config::{self, SINGLETON_ID};

/// Configuration record repository.
#[derive(Debug, Clone)]
pub struct SystemConfigRepository {
    db: DatabaseConnection,
}

impl SystemConfigRepository {
    /// Creates a new configuration repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds the configuration row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find(&self) -> Result<Option<system_config::Model>, DbErr> {
        system_config::Entity::find_by_id(SINGLETON_ID)
            .one(&self.db)
            .await
    }

    /// Inserts or replaces the configuration row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database upsert fails.
    pub async fn upsert(&self, config: &StorageConfig) -> Result<system_config::Model, DbErr> {
        let row = to_active_model(config)?;

        system_config::Entity::insert(row)
            .on_conflict(
                OnConflict::column(system_config::Column::Id)
                    .update_columns([
                        system_config::Column::StorageMode,
                        system_config::Column::LocalRoot,
                        system_config::Column::RemoteCredentials,
                        system_config::Column::RemoteContainerId,
                        system_config::Column::SmtpHost,
                        system_config::Column::SmtpPort,
                        system_config::Column::SmtpSecure,
                        system_config::Column::SmtpUser,
                        system_config::Column::SmtpPassword,
                        system_config::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        self.find()
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("system_config".to_string()))
    }
}

/// Converts a row into the configuration record.
///
/// # Errors
///
/// Returns [`StorageError::ConfigSource`] for an unknown mode, malformed
/// credentials, or an out-of-range port.
pub fn to_storage_config(model: system_config::Model) -> Result<StorageConfig, StorageError> {
    let mode = StorageMode::parse(&model.storage_mode).ok_or_else(|| {
        StorageError::ConfigSource(format!("unknown storage mode '{}'", model.storage_mode))
    })?;

    let remote_credentials = model
        .remote_credentials
        .map(serde_json::from_value::<RemoteCredentials>)
        .transpose()
        .map_err(|e| StorageError::ConfigSource(format!("malformed remote credentials: {e}")))?;

    let smtp = match model.smtp_host.filter(|host| !host.trim().is_empty()) {
        Some(host) => {
            let port = match model.smtp_port {
                Some(port) => u16::try_from(port).map_err(|_| {
                    StorageError::ConfigSource(format!("invalid SMTP port {port}"))
                })?,
                None => SmtpSettings::default().port,
            };
            Some(SmtpSettings {
                host,
                port,
                secure: model.smtp_secure,
                user: model.smtp_user.unwrap_or_default(),
                password: model.smtp_password.unwrap_or_default(),
            })
        }
        None => None,
    };

    Ok(StorageConfig {
        mode,
        local_root: model.local_root,
        remote_credentials,
        remote_container_id: model.remote_container_id,
        smtp,
    })
}

/// Converts the configuration record into a row.
///
/// # Errors
///
/// Returns an error if the credentials cannot be serialized.
pub fn to_active_model(config: &StorageConfig) -> Result<system_config::ActiveModel, DbErr> {
    let remote_credentials = config
        .remote_credentials
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| DbErr::Custom(format!("remote credentials: {e}")))?;
    let smtp = config.smtp.as_ref();

    Ok(system_config::ActiveModel {
        id: Set(SINGLETON_ID),
        storage_mode: Set(config.mode.as_str().to_string()),
        local_root: Set(config.local_root.clone()),
        remote_credentials: Set(remote_credentials),
        remote_container_id: Set(config.remote_container_id.clone()),
        smtp_host: Set(smtp.map(|s| s.host.clone())),
        smtp_port: Set(smtp.map(|s| i32::from(s.port))),
        smtp_secure: Set(smtp.is_some_and(|s| s.secure)),
        smtp_user: Set(smtp.map(|s| s.user.clone()).filter(|u| !u.is_empty())),
        smtp_password: Set(smtp.map(|s| s.password.clone()).filter(|p| !p.is_empty())),
        updated_at: Set(Utc::now().into()),
    })
}

fn source_error(err: DbErr) -> StorageError {
    StorageError::ConfigSource(err.to_string())
}

#[async_trait]
impl ConfigProvider for SystemConfigRepository {
    async fn load(&self) -> Result<StorageConfig, StorageError> {
        match self.find().await.map_err(source_error)? {
            Some(model) => to_storage_config(model),
            None => {
                debug!("No configuration row, using defaults");
                Ok(StorageConfig::default())
            }
        }
    }
}

#[async_trait]
impl ConfigStore for SystemConfigRepository {
    async fn save(&self, config: StorageConfig) -> Result<StorageConfig, StorageError> {
        let model = self.upsert(&config).await.map_err(source_error)?;
        to_storage_config(model)
    }
}
