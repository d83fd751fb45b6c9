// SPDX-License-Identifier: GPL-3.0-only

//! Kernel log entries and the network filesystem stall signature

use serde::{Deserialize, Serialize};

/// syslog priority levels, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogPriority {
    Emerg,
    Alert,
    Crit,
    Err,
    Warning,
    Notice,
    Info,
    Debug,
}

impl LogPriority {
    pub fn level(self) -> u8 {
        match self {
            Self::Emerg => 0,
            Self::Alert => 1,
            Self::Crit => 2,
            Self::Err => 3,
            Self::Warning => 4,
            Self::Notice => 5,
            Self::Info => 6,
            Self::Debug => 7,
        }
    }
}

/// A single journal record, reduced to the fields the watchdog inspects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEntry {
    /// `SYSLOG_IDENTIFIER`, `kernel` for kernel messages.
    pub identifier: Option<String>,
    /// `_TRANSPORT`, `kernel` for messages read from kmsg.
    pub transport: Option<String>,
    pub message: String,
    /// `__REALTIME_TIMESTAMP` in microseconds since the epoch.
    pub realtime_usec: Option<u64>,
}

impl LogEntry {
    pub fn kernel(message: impl Into<String>) -> Self {
        Self {
            identifier: Some("kernel".to_string()),
            transport: Some("kernel".to_string()),
            message: message.into(),
            realtime_usec: None,
        }
    }

    pub fn is_kernel(&self) -> bool {
        self.identifier.as_deref() == Some("kernel") || self.transport.as_deref() == Some("kernel")
    }
}

/// Message pattern the kernel emits when a network filesystem server stops
/// answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StallSignature {
    pub prefix: String,
    pub marker: String,
}

impl Default for StallSignature {
    fn default() -> Self {
        Self {
            prefix: "CIFS: VFS:".to_string(),
            marker: "has not responded".to_string(),
        }
    }
}

impl StallSignature {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        entry.is_kernel()
            && entry.message.starts_with(&self.prefix)
            && entry.message.contains(&self.marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STALL: &str = "CIFS: VFS: \\\\nas has not responded in 180 seconds. Reconnecting...";

    #[test]
    fn matches_kernel_stall_message() {
        assert!(StallSignature::default().matches(&LogEntry::kernel(STALL)));
    }

    #[test]
    fn each_condition_is_required() {
        let signature = StallSignature::default();

        let mut from_userspace = LogEntry::kernel(STALL);
        from_userspace.identifier = Some("mount.cifs".to_string());
        from_userspace.transport = Some("syslog".to_string());
        assert!(!signature.matches(&from_userspace));

        let prefix_not_at_start = LogEntry::kernel(format!("note: {STALL}"));
        assert!(!signature.matches(&prefix_not_at_start));

        let no_marker = LogEntry::kernel("CIFS: VFS: cifs_mount failed w/return code = -13");
        assert!(!signature.matches(&no_marker));
    }

    #[test]
    fn priority_ordering_follows_severity() {
        assert!(LogPriority::Err < LogPriority::Warning);
        assert_eq!(LogPriority::Warning.level(), 4);
    }
}
