// SPDX-License-Identifier: GPL-3.0-only

pub mod bus;
pub mod journal;
pub mod unit;

pub use bus::{BusEvent, BusSignal, EventBus, SignalFilter, SignalHandler};
pub use journal::LogSource;
pub use unit::UnitControl;
