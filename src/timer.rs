//! Re-armable one-shot timer on a dedicated thread.
//!
//! The timer has a single deadline slot, so at most one expiry is ever
//! outstanding: [`arm`](CooldownTimer::arm) replaces the previous deadline
//! atomically and [`cancel`](CooldownTimer::cancel) clears it. Each arm
//! returns a generation number that is passed to the callback, letting the
//! owner recognise and ignore an expiry that raced with a newer arm or a
//! cancel.

use crate::error::{Error, Result};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Default)]
struct TimerState {
    deadline: Option<(Instant, u64)>,
    generation: u64,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the timer thread.
pub(crate) struct CooldownTimer {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CooldownTimer {
    /// Start the timer thread. `on_fire` runs on that thread with the
    /// generation of the deadline that expired.
    ///
    /// The timer lock is not held while `on_fire` runs, so the callback may
    /// call [`arm`](Self::arm) or [`cancel`](Self::cancel).
    pub(crate) fn spawn<F>(on_fire: F) -> Result<Self>
    where
        F: Fn(u64) + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("cooldown-timer".into())
            .spawn(move || run(&worker, on_fire))
            .map_err(|e| Error::ThreadError(format!("failed to spawn timer thread: {e}")))?;

        Ok(Self {
            shared,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Schedule an expiry `delay` from now, replacing any pending one.
    pub(crate) fn arm(&self, delay: Duration) -> u64 {
        let mut state = self.shared.lock();
        state.generation += 1;
        let generation = state.generation;
        state.deadline = Some((Instant::now() + delay, generation));
        self.shared.wakeup.notify_one();
        generation
    }

    /// Drop the pending expiry, if any.
    pub(crate) fn cancel(&self) {
        let mut state = self.shared.lock();
        if state.deadline.take().is_some() {
            self.shared.wakeup.notify_one();
        }
    }

    /// Check whether an expiry is scheduled.
    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.shared.lock().deadline.is_some()
    }

    fn signal_shutdown(&self) {
        let mut state = self.shared.lock();
        state.shutdown = true;
        state.deadline = None;
        self.shared.wakeup.notify_one();
    }

    /// Stop the timer thread and wait for it to exit.
    ///
    /// Must not be called while holding a lock the callback takes.
    pub(crate) fn shutdown(&self) -> Result<()> {
        self.signal_shutdown();

        let handle = self
            .thread
            .lock()
            .map_err(|_| Error::ThreadError("timer handle mutex poisoned".into()))?
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return Ok(());
            }
            handle
                .join()
                .map_err(|_| Error::ThreadError("failed to join timer thread".into()))?;
        }
        Ok(())
    }
}

impl Drop for CooldownTimer {
    fn drop(&mut self) {
        // The last owner may be the timer thread itself, so never join here.
        self.signal_shutdown();
    }
}

fn run<F: Fn(u64)>(shared: &Shared, on_fire: F) {
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            break;
        }

        match state.deadline {
            None => {
                state = shared
                    .wakeup
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            Some((at, generation)) => {
                let now = Instant::now();
                if now >= at {
                    state.deadline = None;
                    drop(state);
                    on_fire(generation);
                    state = shared.lock();
                } else {
                    state = shared
                        .wakeup
                        .wait_timeout(state, at - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_fires_once_after_delay() {
        let (tx, rx) = mpsc::channel();
        let timer = CooldownTimer::spawn(move |g| {
            let _ = tx.send((g, Instant::now()));
        })
        .unwrap();

        let start = Instant::now();
        let generation = timer.arm(Duration::from_millis(50));
        let (fired, at) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(fired, generation);
        assert!(at.duration_since(start) >= Duration::from_millis(50));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(!timer.is_armed());
        timer.shutdown().unwrap();
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let (tx, rx) = mpsc::channel();
        let timer = CooldownTimer::spawn(move |g| {
            let _ = tx.send(g);
        })
        .unwrap();

        let first = timer.arm(Duration::from_millis(40));
        let second = timer.arm(Duration::from_millis(120));
        assert_ne!(first, second);

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), second);
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
        timer.shutdown().unwrap();
    }

    #[test]
    fn test_cancel_prevents_fire() {
        let (tx, rx) = mpsc::channel();
        let timer = CooldownTimer::spawn(move |g| {
            let _ = tx.send(g);
        })
        .unwrap();

        timer.arm(Duration::from_millis(30));
        timer.cancel();
        assert!(!timer.is_armed());
        assert!(rx.recv_timeout(Duration::from_millis(120)).is_err());
        timer.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_with_pending_deadline() {
        let (tx, rx) = mpsc::channel();
        let timer = CooldownTimer::spawn(move |g| {
            let _ = tx.send(g);
        })
        .unwrap();

        timer.arm(Duration::from_secs(60));
        timer.shutdown().unwrap();
        // Shutting down twice is harmless.
        timer.shutdown().unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
