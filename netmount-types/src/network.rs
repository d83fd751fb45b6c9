// SPDX-License-Identifier: GPL-3.0-only

//! NetworkManager state enumerations
//!
//! Numeric values follow the `NMState` and `NMDeviceState` enums of the
//! NetworkManager D-Bus API.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown {kind} value {value}")]
pub struct UnknownStateValue {
    pub kind: &'static str,
    pub value: u32,
}

/// Global connectivity state (`org.freedesktop.NetworkManager.State`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NmState {
    Unknown,
    Asleep,
    Disconnected,
    Disconnecting,
    Connecting,
    ConnectedLocal,
    ConnectedSite,
    ConnectedGlobal,
}

impl NmState {
    pub const DEFAULT_ONLINE: [NmState; 3] = [
        NmState::ConnectedLocal,
        NmState::ConnectedSite,
        NmState::ConnectedGlobal,
    ];

    pub fn code(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::Asleep => 10,
            Self::Disconnected => 20,
            Self::Disconnecting => 30,
            Self::Connecting => 40,
            Self::ConnectedLocal => 50,
            Self::ConnectedSite => 60,
            Self::ConnectedGlobal => 70,
        }
    }
}

impl TryFrom<u32> for NmState {
    type Error = UnknownStateValue;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Unknown,
            10 => Self::Asleep,
            20 => Self::Disconnected,
            30 => Self::Disconnecting,
            40 => Self::Connecting,
            50 => Self::ConnectedLocal,
            60 => Self::ConnectedSite,
            70 => Self::ConnectedGlobal,
            _ => {
                return Err(UnknownStateValue {
                    kind: "NMState",
                    value,
                });
            }
        })
    }
}

/// Per-device state carried by `Device.StateChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NmDeviceState {
    Unknown,
    Unmanaged,
    Unavailable,
    Disconnected,
    Prepare,
    Config,
    NeedAuth,
    IpConfig,
    IpCheck,
    Secondaries,
    Activated,
    Deactivating,
    Failed,
}

impl NmDeviceState {
    pub const DEFAULT_ONLINE: [NmDeviceState; 3] = [
        NmDeviceState::IpCheck,
        NmDeviceState::Secondaries,
        NmDeviceState::Activated,
    ];

    pub fn code(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::Unmanaged => 10,
            Self::Unavailable => 20,
            Self::Disconnected => 30,
            Self::Prepare => 40,
            Self::Config => 50,
            Self::NeedAuth => 60,
            Self::IpConfig => 70,
            Self::IpCheck => 80,
            Self::Secondaries => 90,
            Self::Activated => 100,
            Self::Deactivating => 110,
            Self::Failed => 120,
        }
    }
}

impl TryFrom<u32> for NmDeviceState {
    type Error = UnknownStateValue;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Unknown,
            10 => Self::Unmanaged,
            20 => Self::Unavailable,
            30 => Self::Disconnected,
            40 => Self::Prepare,
            50 => Self::Config,
            60 => Self::NeedAuth,
            70 => Self::IpConfig,
            80 => Self::IpCheck,
            90 => Self::Secondaries,
            100 => Self::Activated,
            110 => Self::Deactivating,
            120 => Self::Failed,
            _ => {
                return Err(UnknownStateValue {
                    kind: "NMDeviceState",
                    value,
                });
            }
        })
    }
}

/// Set of enumerated states treated as "online".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineSet<S> {
    states: Vec<S>,
}

impl<S: Copy + PartialEq> OnlineSet<S> {
    pub fn new(states: impl IntoIterator<Item = S>) -> Self {
        Self {
            states: states.into_iter().collect(),
        }
    }

    pub fn contains(&self, state: S) -> bool {
        self.states.contains(&state)
    }
}

impl Default for OnlineSet<NmState> {
    fn default() -> Self {
        Self::new(NmState::DEFAULT_ONLINE)
    }
}

impl Default for OnlineSet<NmDeviceState> {
    fn default() -> Self {
        Self::new(NmDeviceState::DEFAULT_ONLINE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_map_both_ways() {
        for state in [
            NmState::Asleep,
            NmState::Connecting,
            NmState::ConnectedSite,
            NmState::ConnectedGlobal,
        ] {
            assert_eq!(NmState::try_from(state.code()), Ok(state));
        }
        assert_eq!(NmDeviceState::try_from(100), Ok(NmDeviceState::Activated));
        assert_eq!(NmDeviceState::try_from(80), Ok(NmDeviceState::IpCheck));
    }

    #[test]
    fn unknown_values_are_rejected() {
        let err = NmState::try_from(55).unwrap_err();
        assert_eq!(err.value, 55);
        assert!(err.to_string().contains("NMState"));
        assert!(NmDeviceState::try_from(7).is_err());
    }

    #[test]
    fn default_online_sets() {
        let global = OnlineSet::<NmState>::default();
        assert!(global.contains(NmState::ConnectedLocal));
        assert!(!global.contains(NmState::Connecting));

        let device = OnlineSet::<NmDeviceState>::default();
        assert!(device.contains(NmDeviceState::Activated));
        assert!(!device.contains(NmDeviceState::IpConfig));
    }
}
