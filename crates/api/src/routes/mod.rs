//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod config;
pub mod documents;
pub mod health;
pub mod uploads;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(documents::routes())
        .merge(config::routes())
}
