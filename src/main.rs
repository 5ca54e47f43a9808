use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tally::analytics::AnalyticsEngine;
use tally::api;
use tally::config::Config;
use tally::storage;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tally=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let store = storage::connect(&config).await?;

    info!("Initializing database...");
    store.init().await?;
    info!("Database initialized successfully");

    let limits = config.analytics.limits();
    info!(
        "Analytics queries limited to {} buckets, {:?} timeout",
        limits.max_buckets, limits.timeout
    );
    let engine = Arc::new(AnalyticsEngine::new(store, limits));

    let router = api::create_api_router(engine, config.cors_allow_any);

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("API server listening on http://{}", api_addr);
    info!("   - Analytics available at http://{}/api/analytics", api_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
