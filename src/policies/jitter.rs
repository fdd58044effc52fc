//! # Jitter for restart delays.
//!
//! Several instances of one descriptor crash together when their shared dependency
//! goes away; jitter keeps them from coming back in lockstep.
//!
//! - [`JitterPolicy::None`]: exact backoff delay
//! - [`JitterPolicy::Full`]: random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`

use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

/// Policy controlling randomization of restart delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use the exact backoff delay.
    #[default]
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// `delay/2 + random[0, delay/2]`; keeps roughly 75% of the delay on average.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return delay;
        }
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let extra = if half == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=half)
                };
                Duration::from_millis(half + extra)
            }
        }
    }
}

impl FromStr for JitterPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(JitterPolicy::None),
            "full" => Ok(JitterPolicy::Full),
            "equal" => Ok(JitterPolicy::Equal),
            other => Err(format!("unknown jitter policy {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_jitter_bounds() {
        for _ in 0..50 {
            assert!(JitterPolicy::Full.apply(Duration::from_millis(500)) <= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_zero_delay_stays_zero() {
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Equal".parse::<JitterPolicy>(), Ok(JitterPolicy::Equal));
        assert_eq!("none".parse::<JitterPolicy>(), Ok(JitterPolicy::None));
        assert!("sometimes".parse::<JitterPolicy>().is_err());
    }
}
