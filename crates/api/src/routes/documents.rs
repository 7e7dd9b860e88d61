//! Document store and notification routes.

use axum::{
    Json, Router,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError},
    },
    http::{HeaderMap, StatusCode},
    routing::post,
};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use dossier_core::cancel::CancellationToken;
use dossier_core::notify::Contact;
use dossier_core::storage::{InboundFile, StorageError, StoredDocument};
use dossier_shared::AppError;

use crate::{AppState, error::ApiError};

/// Multipart field names accepted for the uploaded file.
pub const FILE_FIELDS: [&str; 2] = ["file", "pdf_apolice"];

/// Creates the document routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents", post(store_document))
        .route("/documents/notify", post(notify))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for a stored document.
#[derive(Debug, Serialize)]
pub struct StoreDocumentResponse {
    /// The stored document record, for the caller to persist.
    pub document: StoredDocument,
    /// Non-file form fields, passed through unchanged.
    pub metadata: Map<String, Value>,
}

/// Request body for a notification.
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    /// Previously stored document.
    pub document: StoredDocument,
    /// Recipient contact.
    pub recipient: Contact,
    /// Subject line.
    pub subject: String,
    /// Body template; `{{name}}` and `{{link}}` are substituted.
    pub body: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn multipart_error(err: MultipartError) -> ApiError {
    let message = format!("Failed to parse multipart data: {}", err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(message).into()
    } else {
        AppError::Validation(message).into()
    }
}

/// Read a file field, failing as soon as it exceeds `max_file_size`.
async fn read_file_field(mut field: Field<'_>, max_file_size: u64) -> Result<InboundFile, ApiError> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let mime_type = field
        .content_type()
        .map_or_else(|| InboundFile::DEFAULT_MIME_TYPE.to_string(), ToString::to_string);

    let mut content = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        let total = (content.len() + chunk.len()) as u64;
        if total > max_file_size {
            return Err(StorageError::file_too_large(total, max_file_size).into());
        }
        content.extend_from_slice(&chunk);
    }

    Ok(InboundFile::new(original_name, mime_type, content.freeze()))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/documents`
/// Store the uploaded file in the active backend.
async fn store_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoreDocumentResponse>), ApiError> {
    let mut file = None;
    let mut metadata = Map::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if FILE_FIELDS.contains(&name.as_str()) {
            file = Some(read_file_field(field, state.max_file_size).await?);
        } else if !name.is_empty() {
            let value = field.text().await.map_err(multipart_error)?;
            metadata.insert(name, Value::String(value));
        }
    }

    let file = file.ok_or(StorageError::NoFile)?;
    debug!(
        original_name = %file.original_name,
        size = file.size_bytes(),
        "Received upload"
    );

    let config = state.config_store.load().await?;
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let document = state
        .storage
        .store(file, &config, &state.base_url(&headers), &cancel)
        .await?;

    info!(
        backend = document.backend_type().as_str(),
        external_id = document.external_id(),
        "Document upload completed"
    );

    Ok((
        StatusCode::CREATED,
        Json(StoreDocumentResponse { document, metadata }),
    ))
}

/// POST `/documents/notify`
/// Email a stored document to a contact.
async fn notify(
    State(state): State<AppState>,
    Json(payload): Json<NotifyRequest>,
) -> Result<StatusCode, ApiError> {
    let config = state.config_store.load().await?;
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    state
        .notifier
        .send(
            &payload.document,
            &payload.recipient,
            &payload.subject,
            &payload.body,
            &config,
            &cancel,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
