//! Single-device exclusive access.
//!
//! A [`DeviceHandle`] wraps one input device and tracks whether this process
//! holds an exclusive grab on it. While grabbed, the device's events do not
//! reach any other reader, which is how a touchpad gets "disabled".
//!
//! Opening the underlying device is delegated to a [`DeviceOpener`] so the
//! handle logic does not depend on evdev. The Linux backend is
//! [`EvdevOpener`](crate::EvdevOpener).

use crate::error::{Error, Result};
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A discovered input device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceInfo {
    /// Opaque identifier, usually the `/dev/input/eventN` path.
    pub identifier: String,
    /// Human-readable name reported by the kernel.
    pub name: String,
}

impl DeviceInfo {
    /// Create a new device description.
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identifier, self.name)
    }
}

/// An opened device that supports exclusive grabs.
///
/// Dropping the value closes the device.
pub trait ExclusiveAccess: Send {
    /// Take exclusive ownership of the event stream.
    fn grab(&mut self) -> io::Result<()>;

    /// Give up exclusive ownership.
    fn ungrab(&mut self) -> io::Result<()>;

    /// Name reported by the device, if any.
    fn name(&self) -> Option<String> {
        None
    }
}

/// Opens devices by identifier.
pub trait DeviceOpener: Send + Sync {
    /// Open the device named by `identifier`.
    fn open(&self, identifier: &str) -> io::Result<Box<dyn ExclusiveAccess>>;
}

/// Something that can be disabled and enabled as one touchpad unit.
///
/// Implemented by both [`DeviceHandle`] and
/// [`DeviceGroup`](crate::group::DeviceGroup); the debounce controller only
/// depends on this trait.
pub trait TouchpadControl: Send + Sync {
    /// Disable the touchpad(s) by grabbing them.
    fn disable(&self) -> Result<()>;

    /// Enable the touchpad(s) by releasing the grab.
    fn enable(&self) -> Result<()>;

    /// Check whether the touchpad(s) are currently disabled.
    fn is_disabled(&self) -> bool;

    /// Release everything and close the underlying devices.
    fn stop(&self) -> Result<()>;
}

#[derive(Default)]
struct HandleState {
    device: Option<Box<dyn ExclusiveAccess>>,
    exclusive: bool,
}

/// One physical input device with open/close and grab/release state.
///
/// All mutating operations are serialized by an internal mutex and are
/// idempotent.
pub struct DeviceHandle {
    info: DeviceInfo,
    opener: Arc<dyn DeviceOpener>,
    state: Mutex<HandleState>,
}

impl DeviceHandle {
    /// Create a closed handle. Nothing is opened until [`open`](Self::open).
    pub fn new(info: DeviceInfo, opener: Arc<dyn DeviceOpener>) -> Self {
        Self {
            info,
            opener,
            state: Mutex::new(HandleState::default()),
        }
    }

    /// Device identifier.
    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }

    /// Device description.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn lock(&self) -> Result<MutexGuard<'_, HandleState>> {
        self.state
            .lock()
            .map_err(|_| Error::ThreadError(format!("{} mutex poisoned", self.info.identifier)))
    }

    /// Open the device. Does nothing if it is already open.
    pub fn open(&self) -> Result<()> {
        let mut state = self.lock()?;
        if state.device.is_some() {
            return Ok(());
        }

        let device = self
            .opener
            .open(&self.info.identifier)
            .map_err(|source| Error::DeviceOpen {
                identifier: self.info.identifier.clone(),
                source,
            })?;

        log::info!(
            "opened {} ({})",
            self.info.identifier,
            device.name().unwrap_or_else(|| self.info.name.clone())
        );
        state.device = Some(device);
        state.exclusive = false;
        Ok(())
    }

    /// Close the device. Does nothing if it is already closed.
    ///
    /// A held grab is released first; if that fails the failure is logged
    /// and the device is closed anyway.
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock()?;
        let Some(mut device) = state.device.take() else {
            return Ok(());
        };

        if state.exclusive {
            if let Err(e) = device.ungrab() {
                log::warn!(
                    "failed to release {} during close: {}",
                    self.info.identifier,
                    e
                );
            }
            state.exclusive = false;
        }

        drop(device);
        log::info!("closed {}", self.info.identifier);
        Ok(())
    }

    /// Take an exclusive grab. Does nothing if already exclusive.
    pub fn acquire_exclusive(&self) -> Result<()> {
        let mut state = self.lock()?;
        let HandleState { device, exclusive } = &mut *state;
        let device = device
            .as_mut()
            .ok_or_else(|| Error::NotOpen(self.info.identifier.clone()))?;

        if *exclusive {
            return Ok(());
        }

        device.grab().map_err(|source| Error::DeviceAccess {
            identifier: self.info.identifier.clone(),
            action: "grab",
            source,
        })?;
        *exclusive = true;
        log::debug!("{} grabbed", self.info.identifier);
        Ok(())
    }

    /// Release the exclusive grab. Does nothing if already shared.
    pub fn release_exclusive(&self) -> Result<()> {
        let mut state = self.lock()?;
        let HandleState { device, exclusive } = &mut *state;
        let device = device
            .as_mut()
            .ok_or_else(|| Error::NotOpen(self.info.identifier.clone()))?;

        if !*exclusive {
            return Ok(());
        }

        device.ungrab().map_err(|source| Error::DeviceAccess {
            identifier: self.info.identifier.clone(),
            action: "release",
            source,
        })?;
        *exclusive = false;
        log::debug!("{} released", self.info.identifier);
        Ok(())
    }

    /// Check whether this process holds the exclusive grab.
    pub fn is_exclusive(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.device.is_some() && s.exclusive)
            .unwrap_or(false)
    }

    /// Check whether the device is open.
    pub fn is_open(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.device.is_some())
            .unwrap_or(false)
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("info", &self.info)
            .field("open", &self.is_open())
            .field("exclusive", &self.is_exclusive())
            .finish()
    }
}

impl TouchpadControl for DeviceHandle {
    fn disable(&self) -> Result<()> {
        self.acquire_exclusive()
    }

    fn enable(&self) -> Result<()> {
        self.release_exclusive()
    }

    fn is_disabled(&self) -> bool {
        self.is_exclusive()
    }

    fn stop(&self) -> Result<()> {
        self.close()
    }
}
