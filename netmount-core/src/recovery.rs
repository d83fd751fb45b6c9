// SPDX-License-Identifier: GPL-3.0-only

//! Mount recovery procedures
//!
//! Both procedures run under one engine-wide lock, so a stop triggered by a
//! kernel stall can never interleave with the start phase of a restart
//! scheduled by a device coming back online (or with another restart).

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use netmount_contracts::{UnitControl, UnitError};
use netmount_types::unit::{NETWORK_ONLINE_TARGET, NM_WAIT_ONLINE_SERVICE};
use netmount_types::{JobMode, MountSpec, UnitStatus};

/// A single unit operation issued by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitAction {
    Status(String),
    ResetFailed(String),
    Stop(String),
    Start(String),
}

impl UnitAction {
    pub fn unit(&self) -> &str {
        match self {
            Self::Status(unit) | Self::ResetFailed(unit) | Self::Stop(unit) | Self::Start(unit) => {
                unit
            }
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Status(_))
    }
}

impl fmt::Display for UnitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(unit) => write!(f, "status {unit}"),
            Self::ResetFailed(unit) => write!(f, "reset-failed {unit}"),
            Self::Stop(unit) => write!(f, "stop {unit}"),
            Self::Start(unit) => write!(f, "start {unit}"),
        }
    }
}

/// Outcome of a recovery procedure: every attempted action, in order, and
/// every failure collected along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub actions: Vec<UnitAction>,
    pub failures: Vec<UnitError>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn mutations(&self) -> usize {
        self.actions.iter().filter(|a| a.is_mutation()).count()
    }

    fn record<T>(&mut self, action: UnitAction, result: Result<T, UnitError>) -> Option<T> {
        self.actions.push(action.clone());
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("{action} failed: {err}");
                self.failures.push(err);
                None
            }
        }
    }
}

pub struct MountRecoveryEngine {
    units: Arc<dyn UnitControl>,
    mounts: Vec<MountSpec>,
    lock: Mutex<()>,
}

impl MountRecoveryEngine {
    pub fn new(units: Arc<dyn UnitControl>, mounts: Vec<MountSpec>) -> Self {
        Self {
            units,
            mounts,
            lock: Mutex::new(()),
        }
    }

    /// Bring every automount back after connectivity returns.
    ///
    /// Status is collected for all mounts first. Mutations only happen when
    /// at least one automount is not active, so a call with everything
    /// healthy is read-only.
    pub async fn restart_all(&self) -> RecoveryReport {
        let _guard = self.lock.lock().await;
        let mut report = RecoveryReport::default();
        let mut pending = Vec::new();

        for mount in &self.mounts {
            let mount_unit = mount.mount_unit();
            if let Some(status) = self.status(&mount_unit, &mut report).await
                && status.is_failed()
            {
                info!("{mount_unit} is failed, resetting");
                self.reset_failed(&mount_unit, &mut report).await;
            }

            // A failed status query leaves the automount alone: without a
            // state there is nothing proving it needs a restart.
            let automount_unit = mount.automount_unit();
            if let Some(status) = self.status(&automount_unit, &mut report).await
                && !status.is_active()
            {
                info!(
                    "{automount_unit} is not active ({}), restarting",
                    status.active_state
                );
                pending.push(mount);
            }
        }

        if pending.is_empty() {
            debug!("All automounts active, nothing to restart");
            return report;
        }

        // These block on every automount being satisfied and would hang
        // while the automounts restart.
        for unit in [NETWORK_ONLINE_TARGET, NM_WAIT_ONLINE_SERVICE] {
            self.stop(unit, &mut report).await;
        }

        for mount in pending {
            let automount_unit = mount.automount_unit();
            // reset-failed on a healthy unit is a no-op, so start is
            // attempted whatever it returned.
            self.reset_failed(&automount_unit, &mut report).await;
            self.start(&automount_unit, &mut report).await;
        }

        summarize("restart", &report);
        report
    }

    /// Stop every mount unit. Failures are collected; every mount is
    /// attempted.
    pub async fn stop_all(&self) -> RecoveryReport {
        let _guard = self.lock.lock().await;
        let mut report = RecoveryReport::default();

        for mount in &self.mounts {
            self.stop(&mount.mount_unit(), &mut report).await;
        }

        summarize("stop", &report);
        report
    }

    async fn status(&self, unit: &str, report: &mut RecoveryReport) -> Option<UnitStatus> {
        let result = self.units.status(unit).await;
        report.record(UnitAction::Status(unit.to_string()), result)
    }

    async fn reset_failed(&self, unit: &str, report: &mut RecoveryReport) {
        let result = self.units.reset_failed(unit).await;
        report.record(UnitAction::ResetFailed(unit.to_string()), result);
    }

    async fn stop(&self, unit: &str, report: &mut RecoveryReport) {
        let result = self.units.stop(unit, JobMode::Replace).await;
        report.record(UnitAction::Stop(unit.to_string()), result);
    }

    async fn start(&self, unit: &str, report: &mut RecoveryReport) {
        let result = self.units.start(unit, JobMode::Replace).await;
        report.record(UnitAction::Start(unit.to_string()), result);
    }
}

fn summarize(procedure: &str, report: &RecoveryReport) {
    if report.is_clean() {
        info!(
            "Mount {procedure} finished: {} unit operation(s)",
            report.actions.len()
        );
    } else {
        let units: Vec<&str> = report.failures.iter().map(|f| f.unit.as_str()).collect();
        warn!(
            "Mount {procedure} finished with {} failure(s): {}",
            report.failures.len(),
            units.join(", ")
        );
    }
}
