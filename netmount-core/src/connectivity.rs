// SPDX-License-Identifier: GPL-3.0-only

//! NetworkManager connectivity monitoring
//!
//! Raw enumerated states are folded into per-device and global online flags.
//! Actions only fire on edges: repeating the same state is a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use netmount_contracts::{BusError, BusEvent, BusSignal, EventBus, SignalFilter, SignalHandler};
use netmount_types::{NetworkConfig, NmDeviceState, NmState, OnlineSet, UnknownStateValue};

use crate::recovery::MountRecoveryEngine;

/// Ordered list of signal handlers. The first handler that reports the
/// signal as consumed stops the dispatch.
#[derive(Default)]
pub struct SignalDispatcher {
    handlers: Vec<Box<dyn SignalHandler>>,
}

impl SignalDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Box<dyn SignalHandler>) {
        self.handlers.push(handler);
    }

    pub async fn dispatch(&mut self, signal: &BusSignal) -> bool {
        for handler in &mut self.handlers {
            if handler.handle(signal).await {
                return true;
            }
        }
        false
    }
}

/// Tracks whether each network device is online and schedules a mount
/// restart when one comes online.
pub struct DeviceStateHandler {
    devices: HashMap<String, bool>,
    online: OnlineSet<NmDeviceState>,
    engine: Arc<MountRecoveryEngine>,
    tasks: TaskTracker,
}

impl DeviceStateHandler {
    pub fn new(
        engine: Arc<MountRecoveryEngine>,
        online: OnlineSet<NmDeviceState>,
        tasks: TaskTracker,
    ) -> Self {
        Self {
            devices: HashMap::new(),
            online,
            engine,
            tasks,
        }
    }

    /// Record the new online flag for `device_id`. Returns `true` only when
    /// the device just went online.
    fn observe(&mut self, device_id: &str, online: bool) -> bool {
        if self.devices.get(device_id) == Some(&online) {
            return false;
        }

        self.devices.insert(device_id.to_string(), online);
        debug!(
            "Device {device_id} is now {}",
            if online { "online" } else { "offline" }
        );
        online
    }

    /// Run `restart_all` without holding up signal processing. Nothing
    /// awaits the outcome, so the task reports its result itself.
    fn spawn_restart(&self) {
        let engine = self.engine.clone();
        self.tasks.spawn(async move {
            let report = engine.restart_all().await;
            if !report.is_clean() {
                warn!(
                    "Mount restart after reconnect left {} failure(s)",
                    report.failures.len()
                );
            }
        });
    }
}

#[async_trait]
impl SignalHandler for DeviceStateHandler {
    async fn handle(&mut self, signal: &BusSignal) -> bool {
        if !signal.is_device_state_changed() {
            return false;
        }

        let device_id = signal.object_id();
        let Some(raw) = signal.state else {
            warn!("Ignoring StateChanged without state from device {device_id}");
            return false;
        };
        let state = match NmDeviceState::try_from(raw) {
            Ok(state) => state,
            Err(e) => {
                warn!("Ignoring device {device_id} signal: {e}");
                return false;
            }
        };

        let online = self.online.contains(state);
        if self.observe(device_id, online) {
            info!("Device {device_id} is online ({state:?}), restarting mounts");
            self.spawn_restart();
        }

        false
    }
}

/// Edge detector for the global NetworkManager state.
#[derive(Debug)]
pub struct GlobalStateTracker {
    current: Option<bool>,
    online: OnlineSet<NmState>,
}

impl GlobalStateTracker {
    pub fn new(online: OnlineSet<NmState>) -> Self {
        Self {
            current: None,
            online,
        }
    }

    pub fn is_online(&self) -> Option<bool> {
        self.current
    }

    /// Fold a raw state in. Returns the new flag when it changed.
    pub fn observe(&mut self, raw: u32) -> Result<Option<bool>, UnknownStateValue> {
        let state = NmState::try_from(raw)?;
        let online = self.online.contains(state);
        if self.current == Some(online) {
            return Ok(None);
        }
        self.current = Some(online);
        Ok(Some(online))
    }
}

pub struct ConnectivityMonitor {
    engine: Arc<MountRecoveryEngine>,
    dispatcher: SignalDispatcher,
    global: GlobalStateTracker,
    tasks: TaskTracker,
}

impl ConnectivityMonitor {
    pub fn new(engine: Arc<MountRecoveryEngine>, network: &NetworkConfig) -> Self {
        let tasks = TaskTracker::new();
        let mut dispatcher = SignalDispatcher::new();
        dispatcher.register(Box::new(DeviceStateHandler::new(
            engine.clone(),
            network.device_online_set(),
            tasks.clone(),
        )));

        Self {
            engine,
            dispatcher,
            global: GlobalStateTracker::new(network.global_online_set()),
            tasks,
        }
    }

    /// Add a handler that sees device signals after the built-in one.
    pub fn register_handler(&mut self, handler: Box<dyn SignalHandler>) {
        self.dispatcher.register(handler);
    }

    /// Process bus events until cancelled or the bus goes away, then wait
    /// for restarts already in flight.
    pub async fn run<B: EventBus>(
        mut self,
        bus: &mut B,
        cancel: CancellationToken,
    ) -> Result<(), BusError> {
        bus.subscribe(SignalFilter::GlobalStateChanged).await?;
        bus.subscribe(SignalFilter::DeviceStateChanged).await?;
        info!("Listening for NetworkManager signals...");

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = bus.next_event() => event,
            };

            match event {
                None => {
                    warn!("Event bus closed, connectivity monitoring stops");
                    break;
                }
                Some(Err(e)) if e.is_fatal() => {
                    error!("Connectivity monitoring stops: {e}");
                    break;
                }
                Some(Err(e)) => warn!("Ignoring bus event: {e}"),
                Some(Ok(BusEvent::Signal(signal))) => {
                    self.dispatcher.dispatch(&signal).await;
                }
                Some(Ok(BusEvent::GlobalStateChanged(raw))) => self.on_global_state(raw).await,
            }
        }

        self.tasks.close();
        if !self.tasks.is_empty() {
            info!("Waiting for {} mount restart(s) in flight", self.tasks.len());
        }
        self.tasks.wait().await;
        Ok(())
    }

    /// Losing global connectivity is the severe case, so the stop is awaited
    /// here rather than spawned.
    async fn on_global_state(&mut self, raw: u32) {
        match self.global.observe(raw) {
            Err(e) => warn!("Ignoring global state change: {e}"),
            Ok(None) => debug!("Global state {raw} changes nothing"),
            Ok(Some(true)) => debug!("Global network state is now online"),
            Ok(Some(false)) => {
                info!("Global network state is now offline, stopping all mounts");
                self.engine.stop_all().await;
            }
        }
    }
}
