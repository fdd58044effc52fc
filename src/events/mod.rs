//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`RestartSource`] origin of a restart intent
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the control loop (every state transition), log pumps
//!   (`LogWriteFailed`), `Supervisor::run` (shutdown progress), `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: the subscriber listener (fans out to `SubscriberSet`) and
//!   anyone holding `Supervisor::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, RestartSource};
