//! # Crash restart delays.
//!
//! A process that keeps dying right after launch should not be hammered back up
//! in a tight loop. [`BackoffPolicy`] turns the length of the current crash
//! streak into a delay:
//!
//! ```text
//! streak:  1    2      3            4              ...
//! delay:   0    first  first·factor first·factor²  ... ≤ max, then jitter
//! ```
//!
//! The curve is a pure function of the streak, so jitter never compounds.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{BackoffPolicy, JitterPolicy};
//!
//! let policy = BackoffPolicy {
//!     first: Duration::from_secs(1),
//!     max: Duration::from_secs(30),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(policy.crash_delay(1), Duration::ZERO);
//! assert_eq!(policy.crash_delay(2), Duration::from_secs(1));
//! assert_eq!(policy.crash_delay(4), Duration::from_secs(4));
//! assert_eq!(policy.crash_delay(20), Duration::from_secs(30));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Exponential backoff between crash restarts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the second restart of a streak.
    pub first: Duration,
    /// Upper bound of the curve (before jitter).
    pub max: Duration,
    /// Growth per step; values below `1.0` shrink the delay.
    pub factor: f64,
    /// Randomization applied on top of the curve.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `1s`, `2s`, `4s`, ... capped at `30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Jittered delay for step `step` of the curve (0-based).
    pub fn next(&self, step: u32) -> Duration {
        self.jitter.apply(self.base(step))
    }

    /// Delay before restarting after the `streak`-th consecutive crash (1-based).
    ///
    /// The first crash after a healthy run restarts at once.
    pub fn crash_delay(&self, streak: u32) -> Duration {
        match streak.checked_sub(2) {
            Some(step) => self.next(step),
            None => Duration::ZERO,
        }
    }

    /// `first × factor^step` clamped to `max`; overflow and NaN clamp too.
    fn base(&self, step: u32) -> Duration {
        let exp = i32::try_from(step).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        if secs.is_finite() && (0.0..=self.max.as_secs_f64()).contains(&secs) {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(first_ms: u64, max_ms: u64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            ..BackoffPolicy::default()
        }
    }

    #[test]
    fn test_streak_of_one_restarts_at_once() {
        let p = BackoffPolicy::default();
        assert_eq!(p.crash_delay(0), Duration::ZERO);
        assert_eq!(p.crash_delay(1), Duration::ZERO);
        assert_eq!(p.crash_delay(2), Duration::from_secs(1));
    }

    #[test]
    fn test_streak_doubles_until_cap() {
        let p = policy(250, 1_500);
        let delays: Vec<u128> = (1..=6).map(|n| p.crash_delay(n).as_millis()).collect();
        assert_eq!(delays, vec![0, 250, 500, 1_000, 1_500, 1_500]);
    }

    #[test]
    fn test_first_above_cap_is_capped() {
        assert_eq!(policy(9_000, 2_000).next(0), Duration::from_secs(2));
    }

    #[test]
    fn test_huge_step_does_not_overflow() {
        assert_eq!(policy(100, 10_000).next(u32::MAX), Duration::from_secs(10));
        assert_eq!(policy(100, 10_000).crash_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_factor_one_is_constant() {
        let p = BackoffPolicy {
            factor: 1.0,
            ..policy(300, 10_000)
        };
        assert!((0..10).all(|s| p.next(s) == Duration::from_millis(300)));
    }

    #[test]
    fn test_full_jitter_never_exceeds_curve() {
        let p = BackoffPolicy {
            jitter: JitterPolicy::Full,
            ..policy(100, 800)
        };
        for step in 0..6 {
            assert!(p.next(step) <= p.base(step));
        }
    }
}
