//! Knowledge graph server: MCP tools and resources, SSE, and REST endpoints.

use kg_api::config::ServerConfig;
use kg_api::server::{self, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let store = config.connect_store().await?;
    if !store.is_available().await {
        tracing::warn!("graph store not reachable yet, answering with empty results until it is");
    }

    let state = Arc::new(AppState::new(
        Arc::clone(&store),
        config.min_trust,
        config.heartbeat,
    ));
    let app = server::router(state);
    tracing::info!("knowledge graph API listening on {}", config.listen);
    axum::serve(
        tokio::net::TcpListener::bind(config.listen).await?,
        app.into_make_service(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    store.shutdown().await;
    Ok(())
}
