// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

use netmount_types::LogEntry;

use crate::LogError;

/// Blocking, pollable log reader.
///
/// `wait` blocks the calling thread, so async callers must run it on a
/// blocking worker.
pub trait LogSource: Send + 'static {
    /// Skip everything already in the log.
    fn seek_tail(&mut self) -> Result<(), LogError>;

    /// Block for at most `timeout`; `true` when new entries may be available.
    fn wait(&mut self, timeout: Duration) -> Result<bool, LogError>;

    /// Take all entries available right now, in arrival order.
    fn drain(&mut self) -> Result<Vec<LogEntry>, LogError>;

    fn close(&mut self);
}
