//! Broadcast bus for system events.
//!
//! Every subscriber owns an independent bounded queue. Publishing never
//! blocks: if a subscriber's queue is full, the event is dropped for that
//! subscriber only and a warning is logged. Subscribers with headroom are
//! never affected by a saturated one.
//!
//! # Example
//!
//! ```
//! use palm_reject::{EventBus, SystemEvent};
//! use std::time::Duration;
//!
//! let bus = EventBus::new();
//! let rx = bus.subscribe().unwrap();
//!
//! bus.publish(SystemEvent::TouchpadToggle);
//! assert_eq!(
//!     rx.recv_timeout(Duration::from_millis(100)).unwrap(),
//!     SystemEvent::TouchpadToggle
//! );
//!
//! // Closing the bus ends every subscription.
//! bus.close();
//! assert!(rx.recv().is_err());
//! ```
//!
//! # Closing
//!
//! [`EventBus::close`] drops every subscriber queue. Receivers drain what is
//! already buffered and then observe a disconnect instead of hanging.
//! After closing, [`EventBus::subscribe`] returns [`Error::BusClosed`] and
//! [`EventBus::publish`] delivers nothing.

use crate::error::{Error, Result};
use crate::event::SystemEvent;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, RwLock};

/// Default per-subscriber queue capacity.
pub const SUBSCRIBER_CAPACITY: usize = 100;

/// Outcome of a single [`EventBus::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Subscribers that received the event.
    pub delivered: usize,
    /// Subscribers whose queue was full.
    pub dropped: usize,
}

/// Sending half of one subscription.
enum Subscriber {
    Sync(SyncSender<SystemEvent>),
    #[cfg(feature = "tokio")]
    Tokio(tokio::sync::mpsc::Sender<SystemEvent>),
}

/// Result of offering an event to a single subscriber.
enum Offer {
    Sent,
    Full,
    Gone,
}

impl Subscriber {
    fn offer(&self, event: SystemEvent) -> Offer {
        match self {
            Subscriber::Sync(sender) => match sender.try_send(event) {
                Ok(()) => Offer::Sent,
                Err(TrySendError::Full(_)) => Offer::Full,
                Err(TrySendError::Disconnected(_)) => Offer::Gone,
            },
            #[cfg(feature = "tokio")]
            Subscriber::Tokio(sender) => {
                use tokio::sync::mpsc::error::TrySendError as AsyncTrySendError;
                match sender.try_send(event) {
                    Ok(()) => Offer::Sent,
                    Err(AsyncTrySendError::Full(_)) => Offer::Full,
                    Err(AsyncTrySendError::Closed(_)) => Offer::Gone,
                }
            }
        }
    }
}

struct Registry {
    subscribers: Vec<Subscriber>,
    closed: bool,
}

/// Process-wide broadcast channel for [`SystemEvent`]s.
///
/// Cloning the bus is cheap; all clones share the same subscriber list.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus whose subscribers buffer [`SUBSCRIBER_CAPACITY`] events.
    pub fn new() -> Self {
        Self::with_capacity(SUBSCRIBER_CAPACITY)
    }

    /// Create a bus with a custom per-subscriber capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "subscriber capacity must be >= 1");
        Self {
            registry: Arc::new(RwLock::new(Registry {
                subscribers: Vec::new(),
                closed: false,
            })),
            capacity,
        }
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> Result<Receiver<SystemEvent>> {
        let (sender, receiver) = mpsc::sync_channel(self.capacity);
        self.register(Subscriber::Sync(sender))?;
        Ok(receiver)
    }

    fn register(&self, subscriber: Subscriber) -> Result<()> {
        let mut registry = self
            .registry
            .write()
            .map_err(|_| Error::ThreadError("event bus lock poisoned".into()))?;
        if registry.closed {
            return Err(Error::BusClosed);
        }
        registry.subscribers.push(subscriber);
        log::debug!(
            "event bus: new subscriber (total {})",
            registry.subscribers.len()
        );
        Ok(())
    }

    /// Deliver `event` to every current subscriber without blocking.
    ///
    /// The subscriber list is read under a shared lock, so one publish call
    /// sees a consistent snapshot even while others subscribe concurrently.
    pub fn publish(&self, event: SystemEvent) -> Delivery {
        let mut delivery = Delivery::default();
        let Ok(registry) = self.registry.read() else {
            log::error!("event bus lock poisoned, dropping {event}");
            return delivery;
        };

        log::debug!(
            "publishing {event} to {} subscriber(s)",
            registry.subscribers.len()
        );

        for (index, subscriber) in registry.subscribers.iter().enumerate() {
            match subscriber.offer(event) {
                Offer::Sent => delivery.delivered += 1,
                Offer::Full => {
                    delivery.dropped += 1;
                    log::warn!("event bus subscriber {index} buffer full, dropping {event}");
                }
                Offer::Gone => {
                    log::debug!("event bus subscriber {index} went away, skipping {event}");
                }
            }
        }

        delivery
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry
            .read()
            .map(|r| r.subscribers.len())
            .unwrap_or(0)
    }

    /// Check whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.registry.read().map(|r| r.closed).unwrap_or(true)
    }

    /// Signal end-of-stream to every subscriber.
    ///
    /// Calling it again is a no-op.
    pub fn close(&self) {
        let mut registry = match self.registry.write() {
            Ok(r) => r,
            Err(poisoned) => poisoned.into_inner(),
        };
        if registry.closed {
            return;
        }
        registry.closed = true;
        let count = registry.subscribers.len();
        registry.subscribers.clear();
        log::debug!("event bus closed ({count} subscriber(s) released)");
    }
}

// ============================================================================
// Tokio async support (behind feature flag)
// ============================================================================

#[cfg(feature = "tokio")]
impl EventBus {
    /// Register a subscriber backed by a tokio channel.
    ///
    /// The queue has the same capacity and drop-on-full behavior as
    /// [`subscribe`](Self::subscribe).
    pub fn subscribe_async(&self) -> Result<tokio::sync::mpsc::Receiver<SystemEvent>> {
        let (sender, receiver) = tokio::sync::mpsc::channel(self.capacity);
        self.register(Subscriber::Tokio(sender))?;
        Ok(receiver)
    }
}
