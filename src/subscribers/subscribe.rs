//! # Subscribe: react to supervisor events.
//!
//! Implement [`Subscribe`] to ship lifecycle events somewhere (logs, metrics,
//! alerting). Each subscriber is driven by a dedicated worker loop fed by a bounded
//! queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Guarantees
//! - Implementations may be slow (I/O, batching); they do **not** block the
//!   control loop nor other subscribers.
//! - If a subscriber's queue overflows, events for that subscriber are **dropped**
//!   and a `SubscriberOverflow` event is published.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind, Subscribe};
//!
//! struct CrashCounter(std::sync::atomic::AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for CrashCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ProcessCrashed {
//!             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "crash-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// An event consumer driven by its own worker task.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Called once per event, in publication order.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Events buffered for this subscriber before overflow.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
