// SPDX-License-Identifier: GPL-3.0-only

//! systemd unit control over D-Bus

use async_trait::async_trait;
use zbus::proxy::CacheProperties;
use zbus::zvariant::OwnedObjectPath;
use zbus::{Connection, proxy};

use netmount_contracts::{UnitControl, UnitError};
use netmount_types::{JobMode, UnitStatus};

#[proxy(
    interface = "org.freedesktop.systemd1.Manager",
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1"
)]
trait SystemdManager {
    fn get_unit(&self, name: &str) -> zbus::Result<OwnedObjectPath>;

    fn reset_failed_unit(&self, name: &str) -> zbus::Result<()>;

    fn stop_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    fn start_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
}

#[proxy(
    interface = "org.freedesktop.systemd1.Unit",
    default_service = "org.freedesktop.systemd1"
)]
trait SystemdUnit {
    #[zbus(property)]
    fn active_state(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn sub_state(&self) -> zbus::Result<String>;
}

/// [`UnitControl`] backed by the systemd manager on the system bus.
#[derive(Clone)]
pub struct SystemdUnitController {
    connection: Connection,
    manager: SystemdManagerProxy<'static>,
}

impl std::fmt::Debug for SystemdUnitController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemdUnitController").finish_non_exhaustive()
    }
}

impl SystemdUnitController {
    pub async fn new(connection: &Connection) -> zbus::Result<Self> {
        let manager = SystemdManagerProxy::new(connection).await?;
        Ok(Self {
            connection: connection.clone(),
            manager,
        })
    }

    async fn unit_proxy(&self, path: OwnedObjectPath) -> zbus::Result<SystemdUnitProxy<'static>> {
        // Status must reflect the unit right now, not a cached property.
        SystemdUnitProxy::builder(&self.connection)
            .path(path)?
            .cache_properties(CacheProperties::No)
            .build()
            .await
    }
}

#[async_trait]
impl UnitControl for SystemdUnitController {
    async fn status(&self, unit: &str) -> Result<UnitStatus, UnitError> {
        let dbus_err = |e| UnitError::from_dbus(unit, e);

        let path = self.manager.get_unit(unit).await.map_err(dbus_err)?;
        let proxy = self.unit_proxy(path).await.map_err(dbus_err)?;
        let active_state = proxy.active_state().await.map_err(dbus_err)?;
        let sub_state = proxy.sub_state().await.map_err(dbus_err)?;

        tracing::debug!("{unit}: {active_state} ({sub_state})");
        Ok(UnitStatus::new(active_state.as_str(), sub_state))
    }

    async fn reset_failed(&self, unit: &str) -> Result<(), UnitError> {
        tracing::debug!("ResetFailedUnit {unit}");
        self.manager
            .reset_failed_unit(unit)
            .await
            .map_err(|e| UnitError::from_dbus(unit, e))
    }

    async fn stop(&self, unit: &str, mode: JobMode) -> Result<(), UnitError> {
        let job = self
            .manager
            .stop_unit(unit, mode.as_str())
            .await
            .map_err(|e| UnitError::from_dbus(unit, e))?;
        tracing::info!("Stopping {unit} (job {})", job.as_str());
        Ok(())
    }

    async fn start(&self, unit: &str, mode: JobMode) -> Result<(), UnitError> {
        let job = self
            .manager
            .start_unit(unit, mode.as_str())
            .await
            .map_err(|e| UnitError::from_dbus(unit, e))?;
        tracing::info!("Starting {unit} (job {})", job.as_str());
        Ok(())
    }
}
