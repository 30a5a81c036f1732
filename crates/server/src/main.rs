//! shellcache proxy entry point.
//!
//! Boots the offline cache controller in front of the app origin and serves
//! HTTP. Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::Result;
use shellcache_client::{ControllerConfig, FetchClient, FetchConfig, ShellController};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod proxy;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = config.origin_url()?;

    tracing::info!(origin = %origin, store = %config.store_name(), "Starting shellcache proxy");

    let db = CacheDb::open(&config.db_path).await?;
    let network = Arc::new(FetchClient::new(FetchConfig::from_app(&config), origin.clone())?);
    let controller = Arc::new(ShellController::new(db, network, ControllerConfig::from_app(&config)?));

    controller.install().await?;
    controller.activate().await?;

    let app = proxy::router(proxy::ProxyState::new(controller.clone(), origin, config.max_bytes));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.settle().await;
    tracing::info!("pending cache writes flushed, exiting");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
