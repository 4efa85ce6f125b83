//! Text commands accepted on the control pipe.
//!
//! One command per line. Lines are trimmed and matched case-insensitively:
//!
//! | Line               | Event                          |
//! |--------------------|--------------------------------|
//! | `touchpad_disable` | [`SystemEvent::TouchpadDisable`] |
//! | `touchpad_enable`  | [`SystemEvent::TouchpadEnable`]  |
//! | `touchpad_toggle`  | [`SystemEvent::TouchpadToggle`]  |

use crate::error::Error;
use crate::event::SystemEvent;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A manual touchpad override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OverrideCommand {
    /// Disable the touchpads until told otherwise.
    Disable,
    /// Enable the touchpads.
    Enable,
    /// Flip the current state.
    Toggle,
}

impl OverrideCommand {
    /// Wire form of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideCommand::Disable => "touchpad_disable",
            OverrideCommand::Enable => "touchpad_enable",
            OverrideCommand::Toggle => "touchpad_toggle",
        }
    }

    /// The bus event this command publishes.
    pub fn event(&self) -> SystemEvent {
        match self {
            OverrideCommand::Disable => SystemEvent::TouchpadDisable,
            OverrideCommand::Enable => SystemEvent::TouchpadEnable,
            OverrideCommand::Toggle => SystemEvent::TouchpadToggle,
        }
    }

    /// Parse one received line.
    ///
    /// Returns `Ok(None)` for blank lines.
    pub fn parse_line(line: &str) -> Result<Option<Self>, Error> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        line.parse().map(Some)
    }
}

impl FromStr for OverrideCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "touchpad_disable" => Ok(OverrideCommand::Disable),
            "touchpad_enable" => Ok(OverrideCommand::Enable),
            "touchpad_toggle" => Ok(OverrideCommand::Toggle),
            _ => Err(Error::UnknownCommand(normalized)),
        }
    }
}

impl fmt::Display for OverrideCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<OverrideCommand> for SystemEvent {
    fn from(command: OverrideCommand) -> Self {
        command.event()
    }
}

/// Longest accepted line, in bytes.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Splits a byte stream into complete lines.
///
/// Bytes after the last newline are kept until more data arrives. A line
/// longer than [`MAX_LINE_LEN`] is discarded up to its newline.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every line they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if pos > MAX_LINE_LEN {
                log::warn!("dropping {pos}-byte command line");
                continue;
            }
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }

        if self.pending.len() > MAX_LINE_LEN {
            if !self.discarding {
                log::warn!("dropping command input longer than {MAX_LINE_LEN} bytes");
            }
            self.pending.clear();
            self.discarding = true;
        }
        lines
    }

    /// Take whatever is left as a final line.
    pub fn finish(&mut self) -> Option<String> {
        if std::mem::take(&mut self.discarding) {
            self.pending.clear();
            return None;
        }
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
