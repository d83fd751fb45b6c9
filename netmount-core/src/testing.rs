// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use netmount_contracts::{UnitControl, UnitError, UnitErrorKind};
use netmount_types::{JobMode, MountSpec, UnitStatus};

use crate::recovery::{MountRecoveryEngine, UnitAction};

/// In-memory service manager that records every call.
///
/// Mutations update the recorded `ActiveState` so repeated procedures see
/// the effect of earlier ones.
#[derive(Clone, Default)]
pub(crate) struct FakeUnits {
    states: Arc<Mutex<HashMap<String, String>>>,
    failing: Arc<Mutex<Vec<UnitAction>>>,
    calls: Arc<Mutex<Vec<UnitAction>>>,
}

impl FakeUnits {
    pub(crate) fn with_states(states: &[(&str, &str)]) -> Self {
        let fake = Self::default();
        for (unit, state) in states {
            fake.set_state(unit, state);
        }
        fake
    }

    pub(crate) fn set_state(&self, unit: &str, state: &str) {
        self.states
            .lock()
            .unwrap()
            .insert(unit.to_string(), state.to_string());
    }

    pub(crate) fn state(&self, unit: &str) -> Option<String> {
        self.states.lock().unwrap().get(unit).cloned()
    }

    pub(crate) fn fail_on(&self, action: UnitAction) {
        self.failing.lock().unwrap().push(action);
    }

    pub(crate) fn calls(&self) -> Vec<UnitAction> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn take_calls(&self) -> Vec<UnitAction> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub(crate) fn count(&self, action: &UnitAction) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == action).count()
    }

    pub(crate) fn engine(&self, mounts: &[&str]) -> Arc<MountRecoveryEngine> {
        Arc::new(MountRecoveryEngine::new(
            Arc::new(self.clone()),
            mounts.iter().map(|name| MountSpec::new(*name)).collect(),
        ))
    }

    async fn record(&self, action: UnitAction) -> Result<(), UnitError> {
        // Give other tasks a chance to run, like a real remote call would.
        tokio::task::yield_now().await;

        self.calls.lock().unwrap().push(action.clone());
        if self.failing.lock().unwrap().contains(&action) {
            return Err(UnitError::new(
                action.unit(),
                UnitErrorKind::Failed,
                "injected failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitControl for FakeUnits {
    async fn status(&self, unit: &str) -> Result<UnitStatus, UnitError> {
        self.record(UnitAction::Status(unit.to_string())).await?;
        self.state(unit)
            .map(|state| UnitStatus::from(state.as_str()))
            .ok_or_else(|| UnitError::new(unit, UnitErrorKind::NotFound, "unit not loaded"))
    }

    async fn reset_failed(&self, unit: &str) -> Result<(), UnitError> {
        self.record(UnitAction::ResetFailed(unit.to_string())).await?;
        if self.state(unit).as_deref() == Some("failed") {
            self.set_state(unit, "inactive");
        }
        Ok(())
    }

    async fn stop(&self, unit: &str, _mode: JobMode) -> Result<(), UnitError> {
        self.record(UnitAction::Stop(unit.to_string())).await?;
        self.set_state(unit, "inactive");
        Ok(())
    }

    async fn start(&self, unit: &str, _mode: JobMode) -> Result<(), UnitError> {
        self.record(UnitAction::Start(unit.to_string())).await?;
        self.set_state(unit, "active");
        Ok(())
    }
}

pub(crate) fn status(unit: &str) -> UnitAction {
    UnitAction::Status(unit.to_string())
}

pub(crate) fn reset_failed(unit: &str) -> UnitAction {
    UnitAction::ResetFailed(unit.to_string())
}

pub(crate) fn stop(unit: &str) -> UnitAction {
    UnitAction::Stop(unit.to_string())
}

pub(crate) fn start(unit: &str) -> UnitAction {
    UnitAction::Start(unit.to_string())
}
