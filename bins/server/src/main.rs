//! Dossier API Server
//!
//! Main entry point for the Dossier document service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dossier_api::{AppState, create_router};
use dossier_core::notify::Notifier;
use dossier_core::storage::{
    ConfigStore, DriveEndpoints, LocalBackend, MemoryConfigStore, RemoteBackend,
    RetrievalGateway, StorageRouter,
};
use dossier_db::{SystemConfigRepository, connect_with_pool};
use dossier_shared::{AppConfig, SmtpMailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dossier=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Configuration record: database when configured, otherwise in memory
    let config_store: Arc<dyn ConfigStore> = match &config.database {
        Some(database) => {
            let db = connect_with_pool(
                &database.url,
                database.max_connections,
                database.min_connections,
            )
            .await?;
            info!("Connected to database");
            Arc::new(SystemConfigRepository::new(db))
        }
        None => {
            warn!("No database configured, configuration record is kept in memory");
            Arc::new(MemoryConfigStore::default())
        }
    };

    // Storage backends
    let local = LocalBackend::new(&config.storage.default_root);
    let remote = RemoteBackend::new(
        DriveEndpoints {
            token_url: config.drive.token_url.clone(),
            upload_url: config.drive.upload_url.clone(),
        },
        Duration::from_secs(config.drive.api_timeout_secs),
    )?;
    info!(
        default_root = %config.storage.default_root,
        max_file_size = config.storage.max_file_size,
        "Storage configured"
    );

    // Create application state
    let state = AppState {
        config_store,
        storage: Arc::new(
            StorageRouter::new(local.clone(), remote)
                .with_max_file_size(config.storage.max_file_size),
        ),
        retrieval: Arc::new(RetrievalGateway::new(local.clone())),
        notifier: Arc::new(Notifier::new(SmtpMailer::new(config.email.clone()), local)),
        public_url: config.server.public_url.clone(),
        max_file_size: config.storage.max_file_size,
        request_timeout: Duration::from_secs(config.server.request_timeout_secs),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
