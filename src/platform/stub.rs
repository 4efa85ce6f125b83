//! Fallback for targets without evdev.

use crate::bus::EventBus;
use crate::command::OverrideCommand;
use crate::device::{DeviceInfo, DeviceOpener, ExclusiveAccess};
use crate::error::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};

fn unsupported() -> Error {
    Error::NotSupported("touchpad control requires Linux evdev".into())
}

/// Device opener that always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvdevOpener;

impl DeviceOpener for EvdevOpener {
    fn open(&self, _identifier: &str) -> io::Result<Box<dyn ExclusiveAccess>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "evdev is only available on Linux",
        ))
    }
}

/// Keyboard monitor placeholder.
pub struct KeyboardMonitor {
    info: DeviceInfo,
}

impl KeyboardMonitor {
    pub fn open(_info: DeviceInfo) -> Result<Self> {
        Err(unsupported())
    }

    pub fn start<F>(&self, _on_key_press: F) -> Result<()>
    where
        F: Fn() + Send + 'static,
    {
        Err(unsupported())
    }

    pub fn stop(&self) -> Result<()> {
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        false
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

/// Command pipe placeholder.
pub struct CommandReceiver {
    path: PathBuf,
}

impl CommandReceiver {
    pub fn new(path: impl Into<PathBuf>, _bus: EventBus) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn start(&self) -> Result<()> {
        Err(unsupported())
    }

    pub fn stop(&self) -> Result<()> {
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        false
    }
}

pub fn send_command(_path: &Path, _command: OverrideCommand) -> Result<()> {
    Err(unsupported())
}
