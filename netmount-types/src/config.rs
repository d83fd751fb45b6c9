// SPDX-License-Identifier: GPL-3.0-only

//! Watchdog configuration loaded from TOML

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::journal::{LogPriority, StallSignature};
use crate::network::{NmDeviceState, NmState, OnlineSet};
use crate::unit::MountSpec;

pub const CONFIG_PATH_ENV: &str = "NETMOUNT_WATCHDOG_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/netmount-watchdog/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found at {path:?}")]
    NotFound { path: PathBuf },
    #[error("failed to read config {path:?}: {reason}")]
    Io { path: PathBuf, reason: String },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchdogConfig {
    /// Mount base names, in recovery order.
    pub mounts: Vec<MountSpec>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub online_global_states: Vec<NmState>,
    pub online_device_states: Vec<NmDeviceState>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            online_global_states: NmState::DEFAULT_ONLINE.to_vec(),
            online_device_states: NmDeviceState::DEFAULT_ONLINE.to_vec(),
        }
    }
}

impl NetworkConfig {
    pub fn global_online_set(&self) -> OnlineSet<NmState> {
        OnlineSet::new(self.online_global_states.iter().copied())
    }

    pub fn device_online_set(&self) -> OnlineSet<NmDeviceState> {
        OnlineSet::new(self.online_device_states.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JournalConfig {
    pub wait_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub min_priority: LogPriority,
    pub stall_prefix: String,
    pub stall_marker: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        let signature = StallSignature::default();
        Self {
            wait_timeout_ms: 1000,
            poll_interval_ms: 500,
            min_priority: LogPriority::Warning,
            stall_prefix: signature.prefix,
            stall_marker: signature.marker,
        }
    }
}

impl JournalConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn signature(&self) -> StallSignature {
        StallSignature {
            prefix: self.stall_prefix.clone(),
            marker: self.stall_marker.clone(),
        }
    }
}

/// Resolve the config path from the environment, falling back to the
/// system-wide default.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

impl WatchdogConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let raw = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: WatchdogConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mounts.is_empty() {
            return Err(ConfigError::Invalid("mounts must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for mount in &self.mounts {
            let name = mount.name();
            if name.is_empty() {
                return Err(ConfigError::Invalid(
                    "mount names must not be empty".to_string(),
                ));
            }
            if name.ends_with(".mount") || name.ends_with(".automount") {
                return Err(ConfigError::Invalid(format!(
                    "mount '{name}' must be a base name without unit suffix"
                )));
            }
            if name.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "mount '{name}' must be a unit base name, not a path"
                )));
            }
            if !seen.insert(name) {
                return Err(ConfigError::Invalid(format!("mount '{name}' is listed twice")));
            }
        }

        if self.network.online_global_states.is_empty() {
            return Err(ConfigError::Invalid(
                "network.online_global_states must not be empty".to_string(),
            ));
        }
        if self.network.online_device_states.is_empty() {
            return Err(ConfigError::Invalid(
                "network.online_device_states must not be empty".to_string(),
            ));
        }

        if self.journal.wait_timeout_ms == 0 || self.journal.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "journal timeouts must be greater than zero".to_string(),
            ));
        }
        if self.journal.stall_prefix.is_empty() || self.journal.stall_marker.is_empty() {
            return Err(ConfigError::Invalid(
                "journal stall signature must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = WatchdogConfig::from_toml(r#"mounts = ["home-user-Nas", "home-user-Media"]"#)
            .expect("parse config");

        assert_eq!(
            config.mounts,
            vec![MountSpec::new("home-user-Nas"), MountSpec::new("home-user-Media")]
        );
        assert_eq!(config.network, NetworkConfig::default());
        assert_eq!(config.journal.wait_timeout(), Duration::from_secs(1));
        assert_eq!(config.journal.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.journal.signature(), StallSignature::default());
    }

    #[test]
    fn full_config_overrides_sections() {
        let raw = r#"
mounts = ["srv-share"]

[network]
online_global_states = ["connected_global"]
online_device_states = ["activated"]

[journal]
wait_timeout_ms = 250
poll_interval_ms = 100
min_priority = "err"
stall_prefix = "CIFS: VFS:"
stall_marker = "not responding"
"#;
        let config = WatchdogConfig::from_toml(raw).expect("parse config");

        assert!(config.network.global_online_set().contains(NmState::ConnectedGlobal));
        assert!(!config.network.global_online_set().contains(NmState::ConnectedSite));
        assert_eq!(config.journal.min_priority, LogPriority::Err);
        assert_eq!(config.journal.signature().marker, "not responding");
    }

    #[test]
    fn rejects_invalid_mount_lists() {
        for raw in [
            "mounts = []",
            r#"mounts = ["data.mount"]"#,
            r#"mounts = ["data.automount"]"#,
            r#"mounts = ["/mnt/data"]"#,
            r#"mounts = ["data", "data"]"#,
        ] {
            let err = WatchdogConfig::from_toml(raw).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn rejects_unknown_states_and_zero_timeouts() {
        let err = WatchdogConfig::from_toml(
            "mounts = [\"data\"]\n[network]\nonline_global_states = [\"online\"]",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err =
            WatchdogConfig::from_toml("mounts = [\"data\"]\n[journal]\nwait_timeout_ms = 0")
                .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn shipped_example_config_is_valid() {
        let config = WatchdogConfig::from_toml(include_str!("../../resources/config.toml"))
            .expect("example config");
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(config.network, NetworkConfig::default());
        assert_eq!(config.journal, JournalConfig::default());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = WatchdogConfig::load(Path::new("/nonexistent/netmount.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }
}
