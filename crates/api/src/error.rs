//! HTTP error responses.
//!
//! Every handler error is an [`AppError`] rendered as
//! `{ "error": CODE, "message": text }` with the matching status.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use dossier_core::notify::NotifyError;
use dossier_core::storage::StorageError;
use dossier_shared::AppError;

/// Seconds clients are told to wait before retrying a retryable failure.
pub const RETRY_AFTER_SECS: u32 = 30;

/// Error returned by route handlers.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(error = %self.0, code = self.0.error_code(), "Request failed");
        } else {
            warn!(error = %self.0, code = self.0.error_code(), "Request rejected");
        }

        let mut response = (
            status,
            Json(json!({
                "error": self.0.error_code(),
                "message": self.0.to_string()
            })),
        )
            .into_response();

        if self.0.is_retryable() {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }

        response
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self(err.into())
    }
}

impl From<NotifyError> for ApiError {
    fn from(err: NotifyError) -> Self {
        Self(err.into())
    }
}
