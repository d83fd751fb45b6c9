// SPDX-License-Identifier: GPL-3.0-only

//! Network mount watchdog
//!
//! Stops configured network mounts when connectivity drops or the kernel
//! reports a stalled CIFS server, and restarts their automounts once a
//! network device is back online.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};
use zbus::Connection;

use netmount_core::{ConnectivityMonitor, LogAnomalyMonitor, MountRecoveryEngine};
use netmount_types::WatchdogConfig;
use netmount_types::config::config_path;

mod journal;
mod network;
mod systemd;

use journal::JournalctlSource;
use network::NetworkManagerBus;
use systemd::SystemdUnitController;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging to journald/stderr
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("netmount_service=info,netmount_core=info,warn")
        }))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        "Starting network mount watchdog v{}",
        env!("CARGO_PKG_VERSION")
    );

    if !nix::unistd::geteuid().is_root() {
        tracing::warn!("Not running as root, unit control may be denied");
    }

    let path = config_path();
    let config = WatchdogConfig::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    let names: Vec<&str> = config.mounts.iter().map(|m| m.name()).collect();
    tracing::info!("Watching {} mount(s): {}", names.len(), names.join(", "));

    let connection = Connection::system()
        .await
        .context("Failed to connect to the system bus")?;

    let units = SystemdUnitController::new(&connection)
        .await
        .context("Failed to reach the systemd manager")?;
    let engine = Arc::new(MountRecoveryEngine::new(
        Arc::new(units),
        config.mounts.clone(),
    ));

    let connectivity = ConnectivityMonitor::new(engine.clone(), &config.network);
    let mut bus = NetworkManagerBus::new(connection.clone());

    let journal = JournalctlSource::spawn(config.journal.min_priority)
        .context("Failed to start kernel log reader")?;
    let kernel_log = LogAnomalyMonitor::new(journal, engine, &config.journal);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let (network_result, journal_result) = tokio::join!(
        connectivity.run(&mut bus, cancel.clone()),
        kernel_log.run(cancel.clone()),
    );

    if let Err(e) = network_result {
        tracing::error!("Connectivity monitoring failed: {e}");
    }
    if let Err(e) = journal_result {
        tracing::error!("Kernel log monitoring failed: {e}");
    }

    tracing::info!("Cleaning up D-Bus connection");
    drop(bus);
    drop(connection);

    tracing::info!("Network mount watchdog stopped");
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = terminate.recv() => tracing::info!("Received SIGTERM"),
                Ok(()) = tokio::signal::ctrl_c() => tracing::info!("Received shutdown signal"),
            }
        }
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {e}");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for shutdown signals: {e}");
                return;
            }
            tracing::info!("Received shutdown signal");
        }
    }
    cancel.cancel();
}
