//! Restart policies.
//!
//! This module groups the knobs that control **how soon** a crashed process is
//! restarted and **when to give up**.
//!
//! ## Contents
//! - [`BackoffPolicy`] how restart delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized restarts
//! - [`RestartLimit`]  max crash restarts per sliding window (storm protection)
//! - [`RestartHistory`] per-instance bookkeeping for [`RestartLimit`]
//!
//! ## Quick wiring
//! ```text
//! crash ─► RestartHistory::admit(limit)
//!            ├─ false ─► Failed
//!            └─ true  ─► BackoffPolicy::crash_delay(consecutive) ─► Starting
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → immediate, then 1s, 2s, 4s ... capped at 30s.
//! - `RestartLimit::default()` → 10 restarts per 60s.

mod backoff;
mod jitter;
mod limit;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use limit::{RestartHistory, RestartLimit};
