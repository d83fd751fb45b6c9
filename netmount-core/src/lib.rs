// SPDX-License-Identifier: GPL-3.0-only

//! Reactive control loop that keeps network mounts from hanging the host
//!
//! Two monitors feed the recovery engine:
//! - [`ConnectivityMonitor`] turns NetworkManager signals into edge-triggered
//!   online/offline transitions
//! - [`LogAnomalyMonitor`] tails the kernel log for the stall signature
//!
//! [`MountRecoveryEngine`] owns the configured mounts and runs the ordered
//! stop/restart sequences against a [`netmount_contracts::UnitControl`].

pub mod connectivity;
pub mod journal;
pub mod recovery;

#[cfg(test)]
pub(crate) mod testing;

pub use connectivity::{
    ConnectivityMonitor, DeviceStateHandler, GlobalStateTracker, SignalDispatcher,
};
pub use journal::LogAnomalyMonitor;
pub use recovery::{MountRecoveryEngine, RecoveryReport, UnitAction};
