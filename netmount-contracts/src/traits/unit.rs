// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use netmount_types::{JobMode, UnitStatus};

use crate::UnitError;

/// Remote control of service manager units.
///
/// Every method is a single remote call. Implementations do not retry and
/// never swallow failures; retry policy belongs to the caller.
#[async_trait]
pub trait UnitControl: Send + Sync {
    async fn status(&self, unit: &str) -> Result<UnitStatus, UnitError>;

    async fn reset_failed(&self, unit: &str) -> Result<(), UnitError>;

    async fn stop(&self, unit: &str, mode: JobMode) -> Result<(), UnitError>;

    async fn start(&self, unit: &str, mode: JobMode) -> Result<(), UnitError>;
}
