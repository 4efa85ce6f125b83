//! System-level events carried by the [`EventBus`](crate::bus::EventBus).

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A system-level event.
///
/// Events are plain values. The debounce controller reacts to the suspend,
/// resume and touchpad variants; the remaining variants are reserved for
/// other hardware signals and pass through the bus untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SystemEvent {
    /// Placeholder with no meaning.
    None,
    /// The machine is about to suspend.
    LaptopSuspend,
    /// The machine resumed from suspend.
    LaptopResume,
    /// Microphone mute LED switched on.
    MicMuteLedOn,
    /// Microphone mute LED switched off.
    MicMuteLedOff,
    /// Microphone mute LED toggled.
    MicMuteLedToggle,
    /// Keyboard backlight off.
    BacklightOff,
    /// Keyboard backlight low.
    BacklightLow,
    /// Keyboard backlight medium.
    BacklightMedium,
    /// Keyboard backlight high.
    BacklightHigh,
    /// Keyboard backlight toggled.
    BacklightToggle,
    /// Secondary display toggled.
    SecondaryDisplayToggle,
    /// A USB keyboard was plugged in.
    UsbKeyboardAttached,
    /// A USB keyboard was removed.
    UsbKeyboardDetached,
    /// Manual request to disable the touchpads.
    TouchpadDisable,
    /// Manual request to enable the touchpads.
    TouchpadEnable,
    /// Manual request to flip the touchpad state.
    TouchpadToggle,
}

impl SystemEvent {
    /// Every event, in declaration order.
    pub const ALL: [SystemEvent; 17] = [
        SystemEvent::None,
        SystemEvent::LaptopSuspend,
        SystemEvent::LaptopResume,
        SystemEvent::MicMuteLedOn,
        SystemEvent::MicMuteLedOff,
        SystemEvent::MicMuteLedToggle,
        SystemEvent::BacklightOff,
        SystemEvent::BacklightLow,
        SystemEvent::BacklightMedium,
        SystemEvent::BacklightHigh,
        SystemEvent::BacklightToggle,
        SystemEvent::SecondaryDisplayToggle,
        SystemEvent::UsbKeyboardAttached,
        SystemEvent::UsbKeyboardDetached,
        SystemEvent::TouchpadDisable,
        SystemEvent::TouchpadEnable,
        SystemEvent::TouchpadToggle,
    ];

    /// Stable name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            SystemEvent::None => "None",
            SystemEvent::LaptopSuspend => "LaptopSuspend",
            SystemEvent::LaptopResume => "LaptopResume",
            SystemEvent::MicMuteLedOn => "MicMuteLedOn",
            SystemEvent::MicMuteLedOff => "MicMuteLedOff",
            SystemEvent::MicMuteLedToggle => "MicMuteLedToggle",
            SystemEvent::BacklightOff => "BacklightOff",
            SystemEvent::BacklightLow => "BacklightLow",
            SystemEvent::BacklightMedium => "BacklightMedium",
            SystemEvent::BacklightHigh => "BacklightHigh",
            SystemEvent::BacklightToggle => "BacklightToggle",
            SystemEvent::SecondaryDisplayToggle => "SecondaryDisplayToggle",
            SystemEvent::UsbKeyboardAttached => "USBKeyboardAttached",
            SystemEvent::UsbKeyboardDetached => "USBKeyboardDetached",
            SystemEvent::TouchpadDisable => "TouchpadDisable",
            SystemEvent::TouchpadEnable => "TouchpadEnable",
            SystemEvent::TouchpadToggle => "TouchpadToggle",
        }
    }
}

impl fmt::Display for SystemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
