// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use crate::BusError;

pub const NM_DEVICE_INTERFACE: &str = "org.freedesktop.NetworkManager.Device";
pub const STATE_CHANGED_MEMBER: &str = "StateChanged";

/// What a monitor asks the bus to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalFilter {
    /// `StateChanged` on every NetworkManager device object.
    DeviceStateChanged,
    /// The NetworkManager global `StateChanged` callback.
    GlobalStateChanged,
}

/// A raw signal as delivered by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusSignal {
    pub path: String,
    pub interface: String,
    pub member: String,
    /// First `u32` argument of the body, when it has one.
    pub state: Option<u32>,
}

impl BusSignal {
    pub fn device_state_changed(path: impl Into<String>, state: u32) -> Self {
        Self {
            path: path.into(),
            interface: NM_DEVICE_INTERFACE.to_string(),
            member: STATE_CHANGED_MEMBER.to_string(),
            state: Some(state),
        }
    }

    pub fn is_device_state_changed(&self) -> bool {
        self.interface == NM_DEVICE_INTERFACE && self.member == STATE_CHANGED_MEMBER
    }

    /// Last segment of the object path, e.g. `3` for `.../Devices/3`.
    pub fn object_id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Signal(BusSignal),
    GlobalStateChanged(u32),
}

/// Publish/subscribe transport for system state notifications.
#[async_trait]
pub trait EventBus: Send {
    async fn subscribe(&mut self, filter: SignalFilter) -> Result<(), BusError>;

    /// Next delivered event, or `None` once the transport is gone.
    async fn next_event(&mut self) -> Option<Result<BusEvent, BusError>>;
}

/// A signal consumer registered on a dispatcher.
///
/// Returning `false` lets handlers registered after this one see the
/// signal too.
#[async_trait]
pub trait SignalHandler: Send {
    async fn handle(&mut self, signal: &BusSignal) -> bool;
}
