// SPDX-License-Identifier: GPL-3.0-only

//! Kernel log monitoring for network filesystem stalls

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use netmount_contracts::{LogError, LogSource};
use netmount_types::{JournalConfig, LogEntry, StallSignature};

use crate::recovery::MountRecoveryEngine;

pub struct LogAnomalyMonitor<S> {
    source: S,
    engine: Arc<MountRecoveryEngine>,
    signature: StallSignature,
    wait_timeout: Duration,
    poll_interval: Duration,
}

impl<S: LogSource> LogAnomalyMonitor<S> {
    pub fn new(source: S, engine: Arc<MountRecoveryEngine>, config: &JournalConfig) -> Self {
        Self {
            source,
            engine,
            signature: config.signature(),
            wait_timeout: config.wait_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    /// Tail the log until cancelled or the source closes. The source is
    /// closed before returning.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), LogError> {
        let Self {
            mut source,
            engine,
            signature,
            wait_timeout,
            poll_interval,
        } = self;

        // Only entries written after startup may trigger a stop.
        if let Err(e) = source.seek_tail() {
            source.close();
            return Err(e);
        }
        info!("Listening for kernel log...");

        let result = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }

            // The wait blocks, so it runs on the blocking pool and hands the
            // source back afterwards.
            let (returned, waited) = match tokio::task::spawn_blocking(move || {
                let waited = source.wait(wait_timeout);
                (source, waited)
            })
            .await
            {
                Ok(pair) => pair,
                Err(e) => return Err(LogError::Spawn(format!("log wait worker failed: {e}"))),
            };
            source = returned;

            match waited {
                Ok(true) => match source.drain() {
                    Ok(batch) => {
                        if !inspect_batch(&batch, &signature, &engine).await {
                            trace!("No stall in {} kernel log entries", batch.len());
                        }
                    }
                    Err(LogError::Closed) => break Err(LogError::Closed),
                    Err(e) => warn!("Failed to read kernel log: {e}"),
                },
                Ok(false) => {}
                Err(LogError::Closed) => break Err(LogError::Closed),
                Err(e) => warn!("Waiting for kernel log failed: {e}"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                _ = tokio::time::sleep(poll_interval) => {}
            }
        };

        info!("Cleaning up kernel log monitoring");
        source.close();
        result
    }
}

/// Stop all mounts at most once for a batch, on its first stall entry.
/// Returns whether a stall was found.
async fn inspect_batch(
    batch: &[LogEntry],
    signature: &StallSignature,
    engine: &MountRecoveryEngine,
) -> bool {
    let Some(entry) = batch.iter().find(|entry| signature.matches(entry)) else {
        return false;
    };

    debug!(
        "{}: {}",
        entry
            .realtime_usec
            .map(|usec| usec.to_string())
            .unwrap_or_else(|| "-".to_string()),
        entry.message
    );
    info!("Kernel has detected a frozen network mount, stopping all of them now");
    engine.stop_all().await;
    true
}
