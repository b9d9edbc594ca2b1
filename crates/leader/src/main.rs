//! Fleet Leader - resource inventory for a fleet of worker agents
//!
//! Agents report their capacity and allocation here; the leader keeps the
//! data center / rack / agent tree and evicts agents that stop reporting.

use anyhow::{Context, Result};
use leader_lib::{
    health::{components, HealthRegistry},
    observability::{LeaderMetrics, StructuredLogger},
    LeaderResourceTracker,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const LEADER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting fleet-leader");

    let config = config::LeaderConfig::load()?;
    info!(
        leader_name = %config.leader_name,
        api_port = config.api_port,
        "Leader configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::TRACKER).await;

    // Register metrics before the first scrape
    let _metrics = LeaderMetrics::new();

    let tracker_config = config.tracker_config();
    let logger = StructuredLogger::new(&config.leader_name);
    logger.log_startup(LEADER_VERSION, tracker_config.eviction_timeout);

    let tracker = LeaderResourceTracker::spawn_with_health(tracker_config, health_registry.clone())
        .context("Invalid tracker configuration")?;

    let app_state = Arc::new(api::AppState::new(
        tracker.tracker().clone(),
        health_registry.clone(),
    ));

    health_registry.set_ready(true).await;

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state, async move {
        let _ = shutdown_rx.recv().await;
    }));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;

    let _ = shutdown_tx.send(());
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server task panicked"),
        Ok(Ok(())) => {}
    }

    tracker.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}
