//! Error types for the palm-rejection daemon.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for palm-reject operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while controlling touchpads.
#[derive(Debug, Error)]
pub enum Error {
    /// A device could not be opened.
    #[error("failed to open device {identifier}: {source}")]
    DeviceOpen {
        identifier: String,
        #[source]
        source: std::io::Error,
    },

    /// A grab or release call on an open device failed.
    #[error("failed to {action} device {identifier}: {source}")]
    DeviceAccess {
        identifier: String,
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The device must be opened before its access mode can change.
    #[error("device {0} is not open")]
    NotOpen(String),

    /// A member of a device group failed to open. The whole group was closed again.
    ///
    /// `device_index` is the 1-based position of the failing member.
    #[error("failed to open group member {device_index}: {source}")]
    GroupOpen {
        device_index: usize,
        #[source]
        source: Box<Error>,
    },

    /// A member of a device group failed mid-transition.
    ///
    /// The first `transitioned` members already changed state and were left
    /// that way, so the group may be mixed.
    #[error("group member {device_index} failed after {transitioned} member(s) transitioned: {source}")]
    GroupPartial {
        device_index: usize,
        transitioned: usize,
        #[source]
        source: Box<Error>,
    },

    /// The event bus was closed.
    #[error("event bus is closed")]
    BusClosed,

    /// No touchpad device was found.
    #[error("no touchpad device found")]
    NoTouchpad,

    /// No keyboard device was found.
    #[error("no keyboard device found")]
    NoKeyboard,

    /// A line received on the command pipe is not a known command.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// The command pipe could not be created or used.
    #[error("command pipe {path}: {source}")]
    Fifo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Component is already running.
    #[error("already running")]
    AlreadyRunning,

    /// Component is not running.
    #[error("not running")]
    NotRunning,

    /// Thread-related error.
    #[error("thread error: {0}")]
    ThreadError(String),

    /// The requested feature is not supported on this platform.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The 1-based group position of the member that caused this error, if any.
    pub fn device_index(&self) -> Option<usize> {
        match self {
            Error::GroupOpen { device_index, .. } | Error::GroupPartial { device_index, .. } => {
                Some(*device_index)
            }
            _ => None,
        }
    }
}
