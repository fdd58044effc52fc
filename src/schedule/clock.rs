//! # Wall-clock source for cron evaluation.
//!
//! Cron expressions are evaluated against local wall-clock time, which can jump
//! (NTP corrections, DST, suspend/resume). The [`Clock`] trait lets tests drive
//! those jumps explicitly with [`ManualClock`].

use std::sync::Mutex;

use chrono::{Local, NaiveDateTime, TimeDelta};

/// Source of the current local wall-clock time.
pub trait Clock: Send + Sync + 'static {
    /// Current local time (no timezone attached).
    fn now(&self) -> NaiveDateTime;
}

/// The system's local clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
///
/// # Example
/// ```
/// use chrono::{NaiveDate, TimeDelta};
/// use procvisor::{Clock, ManualClock};
///
/// let t0 = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(9, 59, 0).unwrap();
/// let clock = ManualClock::new(t0);
/// clock.advance(TimeDelta::minutes(1));
/// assert_eq!(clock.now(), t0 + TimeDelta::minutes(1));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jumps to `t` (forwards or backwards).
    pub fn set(&self, t: NaiveDateTime) {
        *self.lock() = t;
    }

    /// Moves the clock by `delta` (may be negative).
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.lock();
        *now += delta;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NaiveDateTime> {
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.lock()
    }
}
