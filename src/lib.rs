//! # palm-reject
//!
//! Disables laptop touchpads while you type and brings them back once the
//! keyboard has been quiet for a short cooldown.
//!
//! ## Features
//!
//! - Debounced palm rejection: every keypress restarts the cooldown
//! - Multi-touchpad groups that are disabled and enabled together
//! - Non-blocking broadcast bus for suspend/resume and manual overrides
//! - Manual override commands over a named pipe
//! - Touchpads are disabled with an exclusive evdev grab, so it works on both
//!   X11 and Wayland
//!
//! ## Quick Start
//!
//! ```no_run
//! use palm_reject::daemon::{self, DaemonConfig};
//! use std::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel();
//! ctrlc::set_handler(move || {
//!     let _ = tx.send(());
//! })
//! .expect("Error setting Ctrl-C handler");
//!
//! daemon::run(&DaemonConfig::default(), &rx).expect("daemon failed");
//! ```
//!
//! ## Architecture
//!
//! [`DebounceController`] is the state machine. It drives anything that
//! implements [`TouchpadControl`], which in practice is a [`DeviceGroup`] of
//! [`DeviceHandle`]s. Keypresses arrive from a [`KeyboardMonitor`] thread;
//! system events arrive through the [`EventBus`]. A cooldown timer thread
//! re-enables the touchpads, and every expiry is re-validated against the
//! latest keypress before it acts.

pub mod bus;
pub mod command;
pub mod daemon;
pub mod debounce;
pub mod device;
pub mod discovery;
pub mod error;
pub mod event;
pub mod group;

mod platform;
mod timer;

#[cfg(test)]
mod testing;

// Re-exports
pub use bus::{Delivery, EventBus};
pub use command::OverrideCommand;
pub use daemon::DaemonConfig;
pub use debounce::{DebounceController, Phase};
pub use device::{DeviceHandle, DeviceInfo, TouchpadControl};
pub use error::{Error, Result};
pub use event::SystemEvent;
pub use group::DeviceGroup;
pub use platform::{CommandReceiver, EvdevOpener, KeyboardMonitor};
