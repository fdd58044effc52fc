//! # Restart-storm protection.
//!
//! [`RestartLimit`] caps how many crash restarts an instance may perform inside a
//! sliding time window. [`RestartHistory`] is the per-instance bookkeeping.
//!
//! ```text
//! crash ─► history.admit(now)
//!            ├─ drop entries older than `window`
//!            ├─ len < max_restarts ─► record, restart (with backoff)
//!            └─ otherwise           ─► Failed (operator must reset)
//! ```
//!
//! With `max_restarts = 3` a process that crashes instantly runs four times
//! (initial start + 3 restarts); the fourth crash moves it to `Failed`.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Upper bound on crash restarts per sliding window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestartLimit {
    /// Restarts allowed inside `window` (`0` = never restart after a crash).
    pub max_restarts: u32,
    /// Width of the sliding window.
    pub window: Duration,
}

impl Default for RestartLimit {
    /// `10` restarts per `60s`.
    fn default() -> Self {
        Self {
            max_restarts: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Timestamps of recent crash restarts for one instance.
#[derive(Debug, Default, Clone)]
pub struct RestartHistory {
    recent: VecDeque<Instant>,
}

impl RestartHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a crash restart at `now` if the limit allows it.
    ///
    /// Returns `false` when the limit is exhausted; nothing is recorded then.
    pub fn admit(&mut self, limit: &RestartLimit, now: Instant) -> bool {
        while let Some(&oldest) = self.recent.front() {
            if now.saturating_duration_since(oldest) >= limit.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }

        if self.recent.len() as u32 >= limit.max_restarts {
            return false;
        }
        self.recent.push_back(now);
        true
    }

    /// Number of restarts currently inside the window (as of the last `admit`).
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    /// True if no restart is recorded.
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Forgets everything (operator reset).
    pub fn clear(&mut self) {
        self.recent.clear();
    }
}
