//! Typing detection: the debounced touchpad state machine.
//!
//! The controller disables the touchpad(s) on the first keypress and keeps
//! them disabled until `cooldown` has passed since the *last* keypress.
//! Every keypress re-arms the cooldown timer instead of extending it.
//!
//! It also listens on the [`EventBus`] for system events:
//!
//! | Event             | Effect                                                |
//! |-------------------|-------------------------------------------------------|
//! | `LaptopSuspend`   | cancel timer, force enable                            |
//! | `LaptopResume`    | nothing                                               |
//! | `TouchpadDisable` | disable, cancel timer (stays disabled until an event) |
//! | `TouchpadEnable`  | enable, cancel timer                                  |
//! | `TouchpadToggle`  | flip, cancel timer                                    |
//!
//! All transitions are serialized by one mutex, which is held across the
//! grab/release calls. Device failures are logged and never retried here;
//! the next keypress, expiry or override tries again.
//!
//! A failed group transition can leave some touchpads grabbed and others
//! not. After any failure the cached state is marked out of sync, and the
//! next transition is sent to the devices even if the cache says it is a
//! no-op. Suspend always sends an enable.
//!
//! # Example
//!
//! ```
//! use palm_reject::{DebounceController, EventBus};
//! use palm_reject::device::TouchpadControl;
//! use palm_reject::Result;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::time::Duration;
//!
//! #[derive(Default)]
//! struct Pad(AtomicBool);
//!
//! impl TouchpadControl for Pad {
//!     fn disable(&self) -> Result<()> { self.0.store(true, Ordering::SeqCst); Ok(()) }
//!     fn enable(&self) -> Result<()> { self.0.store(false, Ordering::SeqCst); Ok(()) }
//!     fn is_disabled(&self) -> bool { self.0.load(Ordering::SeqCst) }
//!     fn stop(&self) -> Result<()> { Ok(()) }
//! }
//!
//! let pad = Arc::new(Pad::default());
//! let bus = EventBus::new();
//! let controller = DebounceController::new(pad.clone(), bus.clone(), Duration::from_millis(50));
//! controller.start().unwrap();
//!
//! controller.on_key_press();
//! assert!(pad.is_disabled());
//!
//! std::thread::sleep(Duration::from_millis(200));
//! assert!(!pad.is_disabled());
//!
//! controller.stop().unwrap();
//! ```

use crate::bus::EventBus;
use crate::device::TouchpadControl;
use crate::error::{Error, Result};
use crate::event::SystemEvent;
use crate::timer::CooldownTimer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default cooldown after the last keypress.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(300);

/// How often the bus listener checks whether it should exit.
const LISTEN_POLL: Duration = Duration::from_millis(100);

/// Observable controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Touchpads enabled, no timer.
    Idle,
    /// Touchpads disabled by typing, cooldown timer armed.
    Active,
    /// Touchpads disabled with no timer, e.g. after a manual override.
    Held,
}

struct State {
    running: bool,
    stopped: bool,
    last_key_press: Option<Instant>,
    disabled: bool,
    /// False after a failed transition: the devices may be mixed.
    in_sync: bool,
    pending_timer: Option<u64>,
    timer: Option<CooldownTimer>,
}

struct Inner {
    control: Arc<dyn TouchpadControl>,
    bus: EventBus,
    cooldown: Duration,
    state: Mutex<State>,
    listening: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Disables touchpads while typing and re-enables them after a quiet period.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct DebounceController {
    inner: Arc<Inner>,
}

impl DebounceController {
    /// Create a controller. Nothing happens until [`start`](Self::start).
    pub fn new(control: Arc<dyn TouchpadControl>, bus: EventBus, cooldown: Duration) -> Self {
        let disabled = control.is_disabled();
        Self {
            inner: Arc::new(Inner {
                control,
                bus,
                cooldown,
                state: Mutex::new(State {
                    running: false,
                    stopped: false,
                    last_key_press: None,
                    disabled,
                    in_sync: true,
                    pending_timer: None,
                    timer: None,
                }),
                listening: AtomicBool::new(false),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to the bus and start accepting keypresses.
    pub fn start(&self) -> Result<()> {
        let mut state = self.inner.lock()?;
        if state.running {
            return Err(Error::AlreadyRunning);
        }
        if state.stopped {
            return Err(Error::NotRunning);
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let timer = CooldownTimer::spawn(move |generation| {
            if let Some(inner) = weak.upgrade() {
                inner.on_cooldown_expired(generation);
            }
        })?;

        let events = self.inner.bus.subscribe()?;
        self.inner.listening.store(true, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let listener = thread::Builder::new()
            .name("typing-events".into())
            .spawn(move || {
                while inner.listening.load(Ordering::SeqCst) {
                    match events.recv_timeout(LISTEN_POLL) {
                        Ok(event) => inner.handle_system_event(event),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            log::debug!("event bus closed, typing detection stops listening");
                            break;
                        }
                    }
                }
            });
        let listener = match listener {
            Ok(handle) => handle,
            Err(e) => {
                self.inner.listening.store(false, Ordering::SeqCst);
                let _ = timer.shutdown();
                return Err(Error::ThreadError(format!(
                    "failed to spawn event listener: {e}"
                )));
            }
        };

        *self
            .inner
            .listener
            .lock()
            .map_err(|_| Error::ThreadError("listener mutex poisoned".into()))? = Some(listener);
        state.timer = Some(timer);
        state.running = true;

        log::info!(
            "typing detection started (cooldown {:?})",
            self.inner.cooldown
        );
        Ok(())
    }

    /// Stop the controller.
    ///
    /// Cancels the timer, forces the touchpads enabled regardless of the
    /// current state, and stops listening to the bus. Only the first call
    /// does anything. The returned error, if any, is from the final enable.
    pub fn stop(&self) -> Result<()> {
        let (timer, result) = {
            let mut state = self.inner.lock()?;
            if state.stopped {
                return Ok(());
            }
            state.stopped = true;
            state.running = false;
            cancel_timer(&mut state);

            let result = self.inner.control.enable();
            match &result {
                Ok(()) => {
                    state.disabled = false;
                    state.in_sync = true;
                }
                Err(e) => log::warn!("failed to enable touchpad during shutdown: {e}"),
            }
            (state.timer.take(), result)
        };

        self.inner.listening.store(false, Ordering::SeqCst);
        let listener = self
            .inner
            .listener
            .lock()
            .map_err(|_| Error::ThreadError("listener mutex poisoned".into()))?
            .take();
        if let Some(handle) = listener {
            if handle.join().is_err() {
                log::warn!("typing event listener panicked");
            }
        }
        if let Some(timer) = timer {
            timer.shutdown()?;
        }

        log::info!("typing detection stopped");
        result
    }

    /// Record a keypress.
    ///
    /// Called from the keyboard reader thread for every key-down.
    pub fn on_key_press(&self) {
        self.inner.on_key_press();
    }

    /// Apply a system event directly, bypassing the bus.
    pub fn handle_system_event(&self, event: SystemEvent) {
        self.inner.handle_system_event(event);
    }

    /// Callback suitable for a key-event source.
    pub fn key_press_handler(&self) -> impl Fn() + Send + Sync + 'static {
        let controller = self.clone();
        move || controller.on_key_press()
    }

    /// Whether the controller believes the touchpads are disabled.
    pub fn is_disabled(&self) -> bool {
        self.inner.lock().map(|s| s.disabled).unwrap_or(false)
    }

    /// Whether a cooldown expiry is scheduled.
    pub fn has_pending_timer(&self) -> bool {
        self.inner
            .lock()
            .map(|s| s.pending_timer.is_some())
            .unwrap_or(false)
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match self.inner.lock() {
            Ok(s) if s.disabled && s.pending_timer.is_some() => Phase::Active,
            Ok(s) if s.disabled => Phase::Held,
            _ => Phase::Idle,
        }
    }

    /// Whether the controller is started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.inner.lock().map(|s| s.running).unwrap_or(false)
    }

    /// Configured cooldown.
    pub fn cooldown(&self) -> Duration {
        self.inner.cooldown
    }
}

fn cancel_timer(state: &mut State) {
    if state.pending_timer.take().is_some() {
        if let Some(timer) = &state.timer {
            timer.cancel();
        }
    }
}

fn arm_timer(state: &mut State, delay: Duration) {
    if let Some(timer) = &state.timer {
        state.pending_timer = Some(timer.arm(delay));
    }
}

impl Inner {
    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::ThreadError("typing detection mutex poisoned".into()))
    }

    fn on_key_press(&self) {
        let mut guard = match self.lock() {
            Ok(guard) => guard,
            Err(e) => {
                log::error!("dropping keypress: {e}");
                return;
            }
        };
        let state = &mut *guard;
        if !state.running {
            return;
        }

        if !state.disabled || !state.in_sync {
            if let Err(e) = self.transition(state, true) {
                log::error!("failed to disable touchpad: {e}");
                return;
            }
            log::debug!("touchpad disabled (typing detected)");
        }

        state.last_key_press = Some(Instant::now());
        arm_timer(state, self.cooldown);
    }

    fn on_cooldown_expired(&self, generation: u64) {
        let mut guard = match self.lock() {
            Ok(guard) => guard,
            Err(e) => {
                log::error!("cooldown expiry skipped: {e}");
                return;
            }
        };
        let state = &mut *guard;

        if state.pending_timer != Some(generation) {
            log::debug!("stale cooldown expiry ignored");
            return;
        }
        state.pending_timer = None;

        if let Some(last) = state.last_key_press {
            let since = last.elapsed();
            if since < self.cooldown {
                log::debug!("keypress {since:?} ago, cooldown not over yet");
                arm_timer(state, self.cooldown - since);
                return;
            }
        }

        if !state.disabled && state.in_sync {
            return;
        }

        match self.transition(state, false) {
            Ok(()) => log::debug!("touchpad enabled (cooldown expired)"),
            Err(e) => log::error!("failed to enable touchpad after cooldown: {e}"),
        }
    }

    fn handle_system_event(&self, event: SystemEvent) {
        let mut guard = match self.lock() {
            Ok(guard) => guard,
            Err(e) => {
                log::error!("dropping {event}: {e}");
                return;
            }
        };
        let state = &mut *guard;
        if !state.running {
            log::debug!("{event} ignored, typing detection not running");
            return;
        }

        match event {
            SystemEvent::LaptopSuspend => {
                cancel_timer(state);
                // Member release is idempotent, so always send it.
                match self.transition(state, false) {
                    Ok(()) => log::debug!("touchpad enabled for suspend"),
                    Err(e) => {
                        log::warn!("failed to enable touchpad for suspend: {e}");
                        state.disabled = false;
                    }
                }
            }
            SystemEvent::LaptopResume => {
                log::debug!("laptop resumed, touchpad control ready");
            }
            SystemEvent::TouchpadDisable => {
                if !state.disabled || !state.in_sync {
                    self.set_disabled(state, true, "");
                }
                cancel_timer(state);
            }
            SystemEvent::TouchpadEnable => {
                if state.disabled || !state.in_sync {
                    self.set_disabled(state, false, "");
                }
                cancel_timer(state);
            }
            SystemEvent::TouchpadToggle => {
                let target = !state.disabled;
                self.set_disabled(state, target, " (toggle)");
                cancel_timer(state);
            }
            other => log::trace!("ignoring {other}"),
        }
    }

    /// Drive the devices toward `disabled` and update the cache.
    ///
    /// On failure the cached flag keeps its old value and is marked out of
    /// sync.
    fn transition(&self, state: &mut State, disabled: bool) -> Result<()> {
        let result = if disabled {
            self.control.disable()
        } else {
            self.control.enable()
        };
        match result {
            Ok(()) => {
                state.disabled = disabled;
                state.in_sync = true;
            }
            Err(_) => state.in_sync = false,
        }
        result
    }

    /// Manual transition.
    fn set_disabled(&self, state: &mut State, disabled: bool, how: &str) {
        let verb = if disabled { "disable" } else { "enable" };
        match self.transition(state, disabled) {
            Ok(()) => log::info!("touchpad {verb}d via command{how}"),
            Err(e) => log::error!("failed to {verb} touchpad via command: {e}"),
        }
    }
}
