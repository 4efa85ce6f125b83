//! evdev-backed device access.

use crate::device::{DeviceOpener, ExclusiveAccess};
use evdev::Device;
use std::io;

impl ExclusiveAccess for Device {
    fn grab(&mut self) -> io::Result<()> {
        Device::grab(self)
    }

    fn ungrab(&mut self) -> io::Result<()> {
        Device::ungrab(self)
    }

    fn name(&self) -> Option<String> {
        Device::name(self).map(str::to_string)
    }
}

/// Opens `/dev/input/eventN` paths with evdev.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvdevOpener;

impl DeviceOpener for EvdevOpener {
    fn open(&self, identifier: &str) -> io::Result<Box<dyn ExclusiveAccess>> {
        let device = Device::open(identifier)?;
        Ok(Box::new(device))
    }
}
