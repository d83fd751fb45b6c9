// SPDX-License-Identifier: GPL-3.0-only

//! systemd unit models

use std::fmt;

use serde::{Deserialize, Serialize};

/// Target that blocks until every automount is satisfied.
pub const NETWORK_ONLINE_TARGET: &str = "network-online.target";

/// NetworkManager's wait-online helper, pulled in by `network-online.target`.
pub const NM_WAIT_ONLINE_SERVICE: &str = "NetworkManager-wait-online.service";

/// Coarse unit state as reported by the `ActiveState` property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActiveState {
    Active,
    Reloading,
    Inactive,
    Failed,
    Activating,
    Deactivating,
    Maintenance,
    Refreshing,
    /// A value this build does not know about yet.
    Other(String),
}

impl ActiveState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Reloading => "reloading",
            Self::Inactive => "inactive",
            Self::Failed => "failed",
            Self::Activating => "activating",
            Self::Deactivating => "deactivating",
            Self::Maintenance => "maintenance",
            Self::Refreshing => "refreshing",
            Self::Other(value) => value,
        }
    }
}

impl From<&str> for ActiveState {
    fn from(value: &str) -> Self {
        match value {
            "active" => Self::Active,
            "reloading" => Self::Reloading,
            "inactive" => Self::Inactive,
            "failed" => Self::Failed,
            "activating" => Self::Activating,
            "deactivating" => Self::Deactivating,
            "maintenance" => Self::Maintenance,
            "refreshing" => Self::Refreshing,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ActiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time unit status. Fetched on demand, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStatus {
    pub active_state: ActiveState,
    pub sub_state: String,
}

impl UnitStatus {
    pub fn new(active_state: impl Into<ActiveState>, sub_state: impl Into<String>) -> Self {
        Self {
            active_state: active_state.into(),
            sub_state: sub_state.into(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_state == ActiveState::Active
    }

    pub fn is_failed(&self) -> bool {
        self.active_state == ActiveState::Failed
    }
}

impl From<&str> for UnitStatus {
    fn from(active_state: &str) -> Self {
        Self::new(active_state, "")
    }
}

/// Job mode passed to `StartUnit`/`StopUnit`.
///
/// Only `replace` is used: it replaces any queued job for the unit instead
/// of failing on conflict or isolating other units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobMode {
    #[default]
    Replace,
}

impl JobMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
        }
    }
}

/// A configured network mount, managed as a `.mount`/`.automount` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountSpec {
    name: String,
}

impl MountSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mount_unit(&self) -> String {
        format!("{}.mount", self.name)
    }

    pub fn automount_unit(&self) -> String {
        format!("{}.automount", self.name)
    }
}

impl fmt::Display for MountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
