// SPDX-License-Identifier: GPL-3.0-only

//! Domain models for the network mount watchdog
//!
//! These types are shared by the recovery engine, the monitors and the
//! daemon that wires them to D-Bus and the journal:
//!
//! - **unit**: systemd unit status snapshots and mount/automount pairs
//! - **network**: NetworkManager state enumerations and online sets
//! - **journal**: kernel log entries and the stall signature
//! - **config**: the TOML configuration model

pub mod config;
pub mod journal;
pub mod network;
pub mod unit;

pub use config::{ConfigError, JournalConfig, NetworkConfig, WatchdogConfig};
pub use journal::{LogEntry, LogPriority, StallSignature};
pub use network::{NmDeviceState, NmState, OnlineSet, UnknownStateValue};
pub use unit::{ActiveState, JobMode, MountSpec, UnitStatus};
