//! Scrivener Server
//!
//! HTTP surface for the dataset pipeline: a streaming NDJSON endpoint,
//! job submission and polling, and a health check.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;

use config::ScrivenerConfig;
use handlers::{create_router, AppState};
use scrivener_store::{FsObjectStore, MemoryJobStore, StoreError};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Object storage could not be opened
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Start the Scrivener HTTP server
///
/// Builds the provider, object store and job store from configuration and
/// serves until the process is stopped.
pub async fn start_server(config: ScrivenerConfig) -> Result<(), ServerError> {
    info!("Starting Scrivener server");
    info!("Bind address: {}", config.bind_addr());
    info!("LLM endpoint: {}", config.llm.endpoint);
    info!("Storage root: {}", config.storage.root.display());

    let provider = Arc::new(config.build_provider()?);
    let objects = Arc::new(FsObjectStore::new(&config.storage.root)?);
    let jobs = Arc::new(MemoryJobStore::new());

    let state = AppState::new(
        provider,
        objects,
        jobs,
        config.pipeline.clone(),
        config.models.clone(),
    );
    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Scrivener listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    Ok(())
}
