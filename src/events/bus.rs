//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] used by the control
//! loop, instance waiters, log pumps and the subscriber set.
//!
//! ```text
//! Publishers (many):                  Receivers:
//!   control loop ──┐
//!   log pumps    ──┼──────► Bus ──────► subscriber listener ──► SubscriberSet
//!   supervisor   ──┘                └─► Supervisor::subscribe() (tests, embedders)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits.
//! - **Bounded capacity**: one ring buffer shared by all receivers; laggards get
//!   `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if nobody is subscribed at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
