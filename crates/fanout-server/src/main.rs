//! # Fanout Server
//!
//! Entry point: parse configuration, install logging, serve until Ctrl+C,
//! then drain the bus within the configured grace period.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use fanout_bus::Bus;
use fanout_server::{Server, ServerConfig};
use fanout_telemetry::{init_logging, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();

    init_logging(&TelemetryConfig::from_env()).context("Failed to initialize logging")?;

    let bus = Arc::new(Bus::with_config(config.bus_config()).context("Invalid bus configuration")?);
    let server = Server::bind(config.socket_addr(), Arc::clone(&bus))
        .await
        .with_context(|| format!("Failed to bind {}", config.socket_addr()))?
        .with_max_line_length(config.max_line_length);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = tokio::spawn(server.run(shutdown_rx));

    info!("Fanout server is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    listener
        .await
        .context("Listener task panicked")?
        .context("Listener failed")?;

    match tokio::time::timeout(config.shutdown_grace(), bus.shutdown()).await {
        Ok(report) => info!(
            delivered = report.delivered,
            undelivered = report.retained + report.unread,
            "Bus drained"
        ),
        Err(_) => warn!(
            grace_secs = config.shutdown_grace,
            "Bus did not drain within grace period"
        ),
    }

    Ok(())
}
