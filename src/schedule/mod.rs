//! Time-based restarts.
//!
//! ## Contents
//! - [`CronExpr`] five-field cron expressions (`0 * * * *`)
//! - [`CronTrigger`] coalescing due-instant tracking
//! - [`Clock`], [`SystemClock`], [`ManualClock`] wall-clock sources
//! - [`Scheduler`] one timer task per scheduled descriptor

mod clock;
mod cron;
mod scheduler;
mod trigger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cron::{CronExpr, CronParseError};
pub use scheduler::Scheduler;
pub use trigger::CronTrigger;
