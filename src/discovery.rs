//! Input device discovery.
//!
//! Scans `/dev/input/event*` and reads each device's name from
//! `/sys/class/input/eventN/device/name`. Reading sysfs never opens the
//! device, so discovery has no effect on the input stack.

use crate::device::DeviceInfo;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory containing input event devices.
pub const INPUT_DEV_DIR: &str = "/dev/input";
/// Sysfs directory describing input devices.
pub const SYS_CLASS_INPUT: &str = "/sys/class/input";

/// Keyboard name preferred when present. keyd grabs the physical keyboard
/// and re-emits its events through this virtual device.
const KEYD_KEYBOARD: &str = "keyd virtual keyboard";
/// Standard internal laptop keyboard.
const AT_KEYBOARD: &str = "AT Translated Set 2 keyboard";

/// Check if a device name looks like a touchpad.
pub fn is_touchpad_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("touchpad")
        || lower.contains("trackpad")
        || (lower.contains("asus") && lower.contains("touch"))
}

/// Check if a device name is a keyboard usable for typing detection.
pub fn is_keyboard_name(name: &str) -> bool {
    name.contains(KEYD_KEYBOARD) || name.contains(AT_KEYBOARD)
}

/// Finds touchpads and keyboards.
#[derive(Debug, Clone)]
pub struct Enumerator {
    dev_dir: PathBuf,
    sys_dir: PathBuf,
}

impl Default for Enumerator {
    fn default() -> Self {
        Self::new(INPUT_DEV_DIR, SYS_CLASS_INPUT)
    }
}

impl Enumerator {
    /// Create an enumerator over custom directories.
    pub fn new(dev_dir: impl Into<PathBuf>, sys_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
            sys_dir: sys_dir.into(),
        }
    }

    /// Every named `event*` device, ordered by event number.
    pub fn input_devices(&self) -> Result<Vec<DeviceInfo>> {
        let entries = fs::read_dir(&self.dev_dir)?;

        let mut found: Vec<(u32, DeviceInfo)> = Vec::new();
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let Some(number) = file_name.strip_prefix("event") else {
                continue;
            };

            let Some(name) = self.sysfs_name(&file_name) else {
                continue;
            };
            log::debug!("checking input device {file_name} ({name})");

            let path = self.dev_dir.join(file_name.as_ref());
            let order = number.parse().unwrap_or(u32::MAX);
            found.push((order, DeviceInfo::new(path.to_string_lossy(), name)));
        }

        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.identifier.cmp(&b.1.identifier)));
        Ok(found.into_iter().map(|(_, info)| info).collect())
    }

    /// All touchpads.
    pub fn touchpads(&self) -> Result<Vec<DeviceInfo>> {
        let touchpads: Vec<DeviceInfo> = self
            .input_devices()?
            .into_iter()
            .filter(|d| is_touchpad_name(&d.name))
            .collect();

        if touchpads.is_empty() {
            return Err(Error::NoTouchpad);
        }
        for pad in &touchpads {
            log::info!("found touchpad {pad}");
        }
        log::info!("{} touchpad(s) found", touchpads.len());
        Ok(touchpads)
    }

    /// The keyboard to watch for typing.
    ///
    /// A keyd virtual keyboard wins over the built-in AT keyboard.
    pub fn keyboard(&self) -> Result<DeviceInfo> {
        let devices = self.input_devices()?;

        let keyboard = devices
            .iter()
            .find(|d| d.name.contains(KEYD_KEYBOARD))
            .or_else(|| devices.iter().find(|d| d.name.contains(AT_KEYBOARD)))
            .cloned()
            .ok_or(Error::NoKeyboard)?;

        log::info!("found keyboard {keyboard}");
        Ok(keyboard)
    }

    /// Check if any touchpad exists.
    pub fn touchpad_present(&self) -> bool {
        self.input_devices()
            .map(|ds| ds.iter().any(|d| is_touchpad_name(&d.name)))
            .unwrap_or(false)
    }

    /// Check if a supported keyboard exists.
    pub fn keyboard_present(&self) -> bool {
        self.input_devices()
            .map(|ds| ds.iter().any(|d| is_keyboard_name(&d.name)))
            .unwrap_or(false)
    }

    fn sysfs_name(&self, event: &str) -> Option<String> {
        let path: PathBuf = [self.sys_dir.as_path(), Path::new(event), Path::new("device")]
            .iter()
            .collect::<PathBuf>()
            .join("name");
        let name = fs::read_to_string(path).ok()?;
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}
