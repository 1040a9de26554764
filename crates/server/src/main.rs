//! urlmeta server entry point.
//!
//! Boots the HTTP API on the configured address. Logs are JSON on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use urlmeta_client::{FetchConfig, HttpFetcher};
use urlmeta_core::{AppConfig, Collector, MetadataDb};
use urlmeta_server::{AppState, CollectionQueue, create_router};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let target = config.store_target()?;
    let addr = config.socket_addr()?;

    tracing::info!(database_url = %config.database_url, table = %config.collection_name, "connecting to store");
    let db = MetadataDb::connect(&target, &config.collection_name, config.retry_policy())
        .await
        .context("connecting to store")?;

    let fetcher = HttpFetcher::new(FetchConfig::from(&config))?;
    let collector = Collector::new(Arc::new(fetcher), db.clone());
    let (queue, workers) = CollectionQueue::start(collector.clone(), config.queue_capacity, config.worker_concurrency);

    let app = create_router(AppState::new(collector, queue));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(%addr, "starting urlmeta server");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await
        .context("serving HTTP")?;

    // The router (and with it the last queue handle) is gone; let queued work drain.
    if let Err(e) = workers.await {
        tracing::error!(error = %e, "collection workers panicked");
    }

    db.close().await?;
    tracing::info!("shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(term), Ok(int)) => (term, int),
        _ => {
            tracing::warn!("failed to install unix signal handlers, falling back to ctrl_c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl_c");
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl_c, shutting down"),
        Err(e) => tracing::error!(error = %e, "failed to listen for ctrl_c"),
    }
}
