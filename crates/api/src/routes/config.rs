//! Configuration record routes.

use axum::{Json, Router, extract::State, routing::get};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use dossier_core::storage::{REDACTED, RemoteCredentials, StorageConfig, StorageMode};
use dossier_shared::{AppError, SmtpSettings};

use crate::{AppState, error::ApiError};

/// Creates the configuration routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/config/storage", get(get_config).put(update_config))
}

/// Request body for replacing the configuration record.
#[derive(Debug, Deserialize)]
pub struct UpdateStorageConfigRequest {
    /// Active backend (`LOCAL`, `REMOTE`; `DRIVE` is accepted for `REMOTE`).
    #[serde(default)]
    pub mode: StorageMode,
    /// Local root override.
    #[serde(default)]
    pub local_root: Option<String>,
    /// Remote folder id.
    #[serde(default, alias = "folder_id")]
    pub remote_container_id: Option<String>,
    /// Service account credentials, as an object or as the raw JSON text.
    #[serde(default, alias = "credentials")]
    pub remote_credentials: Option<Value>,
    /// SMTP settings.
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
}

/// Parse credentials sent either as a JSON object or a JSON string.
fn parse_credentials(value: Value) -> Result<Option<RemoteCredentials>, ApiError> {
    let credentials = match value {
        Value::Null => return Ok(None),
        Value::String(text) if text.trim().is_empty() => return Ok(None),
        Value::String(text) => RemoteCredentials::from_service_account_json(&text),
        other => RemoteCredentials::from_service_account_json(&other.to_string()),
    };
    credentials
        .map(Some)
        .map_err(|e| AppError::Validation(e.to_string()).into())
}

/// Keep stored secrets where the client echoed back the redacted placeholder.
fn keep_redacted_secrets(mut update: StorageConfig, current: &StorageConfig) -> StorageConfig {
    if let (Some(new), Some(old)) = (
        update.remote_credentials.as_mut(),
        current.remote_credentials.as_ref(),
    ) {
        if new.private_key == REDACTED {
            new.private_key.clone_from(&old.private_key);
        }
    }
    if let (Some(new), Some(old)) = (update.smtp.as_mut(), current.smtp.as_ref()) {
        if new.password == REDACTED {
            new.password.clone_from(&old.password);
        }
    }
    update
}

/// GET `/config/storage`
/// The current configuration record with secrets redacted.
async fn get_config(State(state): State<AppState>) -> Result<Json<StorageConfig>, ApiError> {
    let config = state.config_store.load().await?;
    Ok(Json(config.redacted()))
}

/// PUT `/config/storage`
/// Replace the configuration record.
async fn update_config(
    State(state): State<AppState>,
    Json(payload): Json<UpdateStorageConfigRequest>,
) -> Result<Json<StorageConfig>, ApiError> {
    let remote_credentials = match payload.remote_credentials {
        Some(value) => parse_credentials(value)?,
        None => None,
    };

    let update = StorageConfig {
        mode: payload.mode,
        local_root: payload.local_root,
        remote_credentials,
        remote_container_id: payload.remote_container_id,
        smtp: payload.smtp,
    };
    let current = state.config_store.load().await?;
    let saved = state
        .config_store
        .save(keep_redacted_secrets(update, &current))
        .await?;

    info!(
        mode = saved.mode.as_str(),
        local_root = saved.configured_root(),
        remote_configured = saved.remote_target().is_ok(),
        smtp_configured = saved.smtp().is_some(),
        "Configuration record updated"
    );

    Ok(Json(saved.redacted()))
}
