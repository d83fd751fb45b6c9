// SPDX-License-Identifier: GPL-3.0-only

pub mod error;
pub mod traits;

pub use error::{BusError, LogError, UnitError, UnitErrorKind};
pub use traits::{
    BusEvent, BusSignal, EventBus, LogSource, SignalFilter, SignalHandler, UnitControl,
};
