//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - Document store, retrieval and notification routes
//! - Configuration record routes
//! - Error responses

pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderMap, header::HOST},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use dossier_core::notify::Notifier;
use dossier_core::storage::{ConfigStore, RetrievalGateway, StorageRouter};
use dossier_shared::SmtpMailer;

pub use error::ApiError;

/// Extra request body allowance for multipart framing and text fields.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Source of the configuration record, read on every request.
    pub config_store: Arc<dyn ConfigStore>,
    /// Routes store requests to the active backend.
    pub storage: Arc<StorageRouter>,
    /// Serves locally stored files.
    pub retrieval: Arc<RetrievalGateway>,
    /// Emails stored documents.
    pub notifier: Arc<Notifier<SmtpMailer>>,
    /// Public base URL for retrieval links; derived from the request if unset.
    pub public_url: Option<String>,
    /// Largest accepted upload.
    pub max_file_size: u64,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl AppState {
    /// Base URL (protocol + host) for links to locally stored files.
    #[must_use]
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(url) = self.public_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url.trim_end_matches('/').to_string();
        }

        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        let host = headers
            .get("x-forwarded-host")
            .or_else(|| headers.get(HOST))
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        format!("{proto}://{host}")
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.max_file_size.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        .nest("/api/v1", routes::api_routes())
        .merge(routes::uploads::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
