//! Test doubles shared by the unit tests.

use crate::device::{DeviceOpener, ExclusiveAccess, TouchpadControl};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct MockState {
    open_calls: HashMap<String, usize>,
    open_now: HashSet<String>,
    fail_open: HashSet<String>,
    fail_grab: HashSet<String>,
    fail_ungrab: HashSet<String>,
    grab_calls: usize,
    ungrab_calls: usize,
}

/// Scriptable [`DeviceOpener`] that tracks which devices are open.
#[derive(Default)]
pub struct MockOpener {
    state: Arc<Mutex<MockState>>,
}

impl MockOpener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_open(&self, identifier: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_open
            .insert(identifier.to_string());
    }

    pub fn fail_grab(&self, identifier: &str, fail: bool) {
        let mut state = self.state.lock().unwrap();
        if fail {
            state.fail_grab.insert(identifier.to_string());
        } else {
            state.fail_grab.remove(identifier);
        }
    }

    pub fn fail_ungrab(&self, identifier: &str, fail: bool) {
        let mut state = self.state.lock().unwrap();
        if fail {
            state.fail_ungrab.insert(identifier.to_string());
        } else {
            state.fail_ungrab.remove(identifier);
        }
    }

    pub fn open_calls(&self, identifier: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .open_calls
            .get(identifier)
            .copied()
            .unwrap_or(0)
    }

    /// Number of devices currently open.
    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().open_now.len()
    }

    pub fn is_open(&self, identifier: &str) -> bool {
        self.state.lock().unwrap().open_now.contains(identifier)
    }

    pub fn grab_calls(&self) -> usize {
        self.state.lock().unwrap().grab_calls
    }

    pub fn ungrab_calls(&self) -> usize {
        self.state.lock().unwrap().ungrab_calls
    }
}

impl DeviceOpener for MockOpener {
    fn open(&self, identifier: &str) -> io::Result<Box<dyn ExclusiveAccess>> {
        let mut state = self.state.lock().unwrap();
        *state.open_calls.entry(identifier.to_string()).or_insert(0) += 1;
        if state.fail_open.contains(identifier) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such device"));
        }
        state.open_now.insert(identifier.to_string());
        Ok(Box::new(MockDevice {
            identifier: identifier.to_string(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockDevice {
    identifier: String,
    state: Arc<Mutex<MockState>>,
}

impl ExclusiveAccess for MockDevice {
    fn grab(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.grab_calls += 1;
        if state.fail_grab.contains(&self.identifier) {
            return Err(io::Error::new(io::ErrorKind::ResourceBusy, "device busy"));
        }
        Ok(())
    }

    fn ungrab(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ungrab_calls += 1;
        if state.fail_ungrab.contains(&self.identifier) {
            return Err(io::Error::new(io::ErrorKind::ResourceBusy, "device busy"));
        }
        Ok(())
    }

    fn name(&self) -> Option<String> {
        Some(format!("mock {}", self.identifier))
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.open_now.remove(&self.identifier);
        }
    }
}

/// [`TouchpadControl`] that records calls and can be told to fail.
#[derive(Default)]
pub struct RecordingControl {
    disabled: AtomicBool,
    fail_disable: AtomicBool,
    fail_enable: AtomicBool,
    disable_calls: AtomicUsize,
    enable_calls: AtomicUsize,
}

impl RecordingControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_disable(&self, fail: bool) {
        self.fail_disable.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_enable(&self, fail: bool) {
        self.fail_enable.store(fail, Ordering::SeqCst);
    }

    pub fn disable_calls(&self) -> usize {
        self.disable_calls.load(Ordering::SeqCst)
    }

    pub fn enable_calls(&self) -> usize {
        self.enable_calls.load(Ordering::SeqCst)
    }

    fn busy() -> Error {
        Error::DeviceAccess {
            identifier: "mock".into(),
            action: "grab",
            source: io::Error::new(io::ErrorKind::ResourceBusy, "device busy"),
        }
    }
}

impl TouchpadControl for RecordingControl {
    fn disable(&self) -> Result<()> {
        self.disable_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_disable.load(Ordering::SeqCst) {
            return Err(Self::busy());
        }
        self.disabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn enable(&self) -> Result<()> {
        self.enable_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_enable.load(Ordering::SeqCst) {
            return Err(Self::busy());
        }
        self.disabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
