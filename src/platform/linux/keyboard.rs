//! Keyboard activity monitor.
//!
//! Reads the keyboard's event stream without grabbing it, so typing still
//! reaches the desktop. Only key-down events count as activity; releases and
//! autorepeat are ignored.

use super::{Readiness, poll_readable};
use crate::device::DeviceInfo;
use crate::error::{Error, Result};
use evdev::{Device, EventType, InputEvent};
use std::io;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// EV_KEY value for a key going down.
const KEY_DOWN: i32 = 1;

/// Check if an input event is a key press.
pub(crate) fn is_key_press(event: &InputEvent) -> bool {
    event.event_type() == EventType::KEY && event.value() == KEY_DOWN
}

/// Watches one keyboard and invokes a callback on every key press.
pub struct KeyboardMonitor {
    info: DeviceInfo,
    device: Mutex<Option<Device>>,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl KeyboardMonitor {
    /// Open the keyboard for reading.
    pub fn open(info: DeviceInfo) -> Result<Self> {
        let device = Device::open(&info.identifier).map_err(|source| Error::DeviceOpen {
            identifier: info.identifier.clone(),
            source,
        })?;
        log::info!("monitoring keyboard {info}");

        Ok(Self {
            info,
            device: Mutex::new(Some(device)),
            running: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
        })
    }

    /// Start reading on a background thread.
    ///
    /// A monitor can be started once; the device moves into the thread.
    pub fn start<F>(&self, on_key_press: F) -> Result<()>
    where
        F: Fn() + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }

        let device = self
            .device
            .lock()
            .map_err(|_| Error::ThreadError("keyboard mutex poisoned".into()))?
            .take();
        let Some(device) = device else {
            self.running.store(false, Ordering::SeqCst);
            return Err(Error::NotRunning);
        };

        let running = Arc::clone(&self.running);
        let identifier = self.info.identifier.clone();
        let spawned = thread::Builder::new()
            .name("keyboard-monitor".into())
            .spawn(move || {
                if let Err(e) = read_loop(device, &running, on_key_press) {
                    log::error!("keyboard monitor for {identifier} stopped: {e}");
                }
                running.store(false, Ordering::SeqCst);
            });

        match spawned {
            Ok(handle) => {
                *self
                    .thread
                    .lock()
                    .map_err(|_| Error::ThreadError("keyboard mutex poisoned".into()))? =
                    Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(Error::ThreadError(format!(
                    "failed to spawn keyboard thread: {e}"
                )))
            }
        }
    }

    /// Stop reading and wait for the thread to exit. Safe to call twice.
    pub fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);

        let handle = self
            .thread
            .lock()
            .map_err(|_| Error::ThreadError("keyboard mutex poisoned".into()))?
            .take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| Error::ThreadError("failed to join keyboard thread".into()))?;
            log::info!("keyboard monitor stopped");
        }
        Ok(())
    }

    /// Check if the reader thread is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The monitored keyboard.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

impl Drop for KeyboardMonitor {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn read_loop<F: Fn()>(mut device: Device, running: &AtomicBool, on_key_press: F) -> io::Result<()> {
    let fd = device.as_raw_fd();

    while running.load(Ordering::SeqCst) {
        match poll_readable(fd)? {
            Readiness::Timeout => continue,
            Readiness::Ready => {}
        }

        let events = match device.fetch_events() {
            Ok(events) => events,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        };
        for event in events {
            if is_key_press(&event) {
                on_key_press();
            }
        }
    }

    Ok(())
}
