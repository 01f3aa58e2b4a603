//! HTTP server initialization and runtime setup.
//!
//! Handles storage selection, service wiring, and Axum server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;

use crate::application::services::LinkService;
use crate::config::Config;
use crate::domain::DeletionPipeline;
use crate::infrastructure::connect_storage;
use crate::routes::app_router;
use crate::state::AppState;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Storage backend (PostgreSQL or memory with journal)
/// - Deletion pipeline
/// - Axum HTTP server with graceful shutdown on Ctrl-C
///
/// Storage is closed once the server has drained.
///
/// # Errors
///
/// Returns an error if:
/// - Storage cannot be opened
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let storage = connect_storage(&config)
        .await
        .context("Failed to open storage")?;

    let pipeline = DeletionPipeline::new(Arc::clone(&storage), config.pipeline_config());
    let link_service = Arc::new(LinkService::new(
        Arc::clone(&storage),
        pipeline,
        config.base_url.clone(),
    ));

    let state = AppState::new(link_service, config.user_links_limit)
        .with_trusted_subnet(config.trusted_subnet);
    let app = app_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, closing storage");
    storage.close().await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
