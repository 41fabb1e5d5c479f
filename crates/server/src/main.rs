mod bootstrap;
mod health;
mod ingress;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;

use dinely_core::config::{AppConfig, LoadOptions};
use dinely_core::queue::RequestQueue;

use crate::ingress::IngressState;

fn init_logging(config: &AppConfig) {
    use dinely_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let worker = app.worker.clone();
    let worker_handle = tokio::spawn(async move { worker.run().await });

    let state = IngressState::new(app.dialog.clone(), app.queue.clone() as Arc<dyn RequestQueue>);
    let router = health::router(app.db_pool.clone()).merge(ingress::router(state));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        address = %address,
        "dinely-server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "dinely-server stopping"
    );
    stop_worker(worker_handle, Duration::from_secs(app.config.server.graceful_shutdown_secs)).await;

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "shutdown signal listener failed");
    }
}

async fn stop_worker(handle: JoinHandle<()>, grace: Duration) {
    handle.abort();
    if tokio::time::timeout(grace, handle).await.is_err() {
        tracing::warn!("fulfillment worker did not stop within the shutdown grace period");
    }
}
