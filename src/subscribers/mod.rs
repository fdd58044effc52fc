//! # Event subscribers.
//!
//! ```text
//! control loop ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet
//!                                                          ┌─────────┼─────────┐
//!                                                          ▼         ▼         ▼
//!                                                      LogWriter  Metrics   Custom
//! ```
//!
//! - [`Subscribe`] the trait to implement
//! - [`SubscriberSet`] bounded per-subscriber queues with panic isolation
//! - [`LogWriter`] built-in `tracing` renderer

mod embedded;
mod subscribe;
mod subscriber_set;

pub use embedded::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
