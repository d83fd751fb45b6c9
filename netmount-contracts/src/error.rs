// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use thiserror::Error;
use zbus::fdo;

const NO_SUCH_UNIT: &str = "org.freedesktop.systemd1.NoSuchUnit";
const LOAD_FAILED: &str = "org.freedesktop.systemd1.LoadFailed";
const ACCESS_DENIED: &str = "org.freedesktop.DBus.Error.AccessDenied";
const INTERACTIVE_AUTH_REQUIRED: &str = "org.freedesktop.DBus.Error.InteractiveAuthorizationRequired";
const NO_REPLY: &str = "org.freedesktop.DBus.Error.NoReply";
const TIMEOUT: &str = "org.freedesktop.DBus.Error.Timeout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitErrorKind {
    NotFound,
    PermissionDenied,
    Timeout,
    Transport,
    Failed,
}

impl fmt::Display for UnitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::Timeout => "timed out",
            Self::Transport => "transport failure",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A failed unit operation, always carrying the unit it targeted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{unit}: {kind}: {message}")]
pub struct UnitError {
    pub unit: String,
    pub kind: UnitErrorKind,
    pub message: String,
}

impl UnitError {
    pub fn new(unit: impl Into<String>, kind: UnitErrorKind, message: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            kind,
            message: message.into(),
        }
    }

    /// Classify a D-Bus failure for `unit`.
    pub fn from_dbus(unit: impl Into<String>, err: zbus::Error) -> Self {
        let kind = match &err {
            zbus::Error::MethodError(name, _, _) => kind_for_error_name(name.as_str()),
            zbus::Error::FDO(fdo_err) => match fdo_err.as_ref() {
                fdo::Error::AccessDenied(_) | fdo::Error::InteractiveAuthorizationRequired(_) => {
                    UnitErrorKind::PermissionDenied
                }
                fdo::Error::NoReply(_) | fdo::Error::Timeout(_) | fdo::Error::TimedOut(_) => {
                    UnitErrorKind::Timeout
                }
                fdo::Error::ServiceUnknown(_) | fdo::Error::Disconnected(_) => {
                    UnitErrorKind::Transport
                }
                fdo::Error::UnknownObject(_) => UnitErrorKind::NotFound,
                _ => UnitErrorKind::Failed,
            },
            zbus::Error::InputOutput(_) => UnitErrorKind::Transport,
            _ => UnitErrorKind::Failed,
        };

        Self::new(unit, kind, err.to_string())
    }
}

fn kind_for_error_name(name: &str) -> UnitErrorKind {
    match name {
        NO_SUCH_UNIT | LOAD_FAILED => UnitErrorKind::NotFound,
        ACCESS_DENIED | INTERACTIVE_AUTH_REQUIRED => UnitErrorKind::PermissionDenied,
        NO_REPLY | TIMEOUT => UnitErrorKind::Timeout,
        _ => UnitErrorKind::Failed,
    }
}

/// Event bus failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The connection is gone; monitors stop when they see this.
    #[error("event bus disconnected: {0}")]
    Disconnected(String),
    #[error("subscription failed: {0}")]
    Subscribe(String),
    #[error("malformed signal: {0}")]
    Malformed(String),
}

impl BusError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

/// Log source failures.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("log source closed")]
    Closed,
    #[error("failed to start log reader: {0}")]
    Spawn(String),
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),
}
