//! # Runtime events emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: one instance moving through its state machine
//! - **Restart events**: crash backoff, scheduled (cron) and operator restarts
//! - **Log events**: log destination failures (the fallback channel)
//! - **Runtime events**: shutdown progress and subscriber health
//!
//! The [`Event`] struct carries metadata such as timestamps, process name and
//! instance, pid, exit status and backoff delays.
//!
//! ## Ordering guarantees
//! `seq` comes from one process-wide counter, so events can be totally ordered
//! even after passing through different subscriber queues.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_process("dsp", 0)
//!     .with_reason("exited with code 1")
//!     .with_delay(Duration::from_secs(2));
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.process.as_deref(), Some("dsp"));
//! assert_eq!(ev.delay_ms, Some(2000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Source of [`Event::seq`].
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Instance lifecycle ===
    /// Spawn requested (state → `Starting`).
    ///
    /// Sets: `process`, `instance`, `restarts`
    ProcessStarting,

    /// OS process confirmed alive (state → `Running`).
    ///
    /// Sets: `process`, `instance`, `pid`
    ProcessRunning,

    /// Spawn failed; handled like a crash by the restart policy.
    ///
    /// Sets: `process`, `instance`, `reason`
    SpawnFailed,

    /// Process exited without a stop request (state → `Crashed`).
    ///
    /// Sets: `process`, `instance`, `exit_code` | `signal`, `reason`
    ProcessCrashed,

    /// Restart limit exhausted (state → `Failed`, terminal).
    ///
    /// Sets: `process`, `instance`, `reason`
    ProcessFailed,

    /// Graceful termination requested (state → `Stopping`).
    ///
    /// Sets: `process`, `instance`, `pid` (if spawned)
    StopRequested,

    /// Termination confirmed (state → `Stopped`).
    ///
    /// Sets: `process`, `instance`, `exit_code` | `signal`
    ProcessStopped,

    // === Restarts ===
    /// Next crash restart scheduled.
    ///
    /// Sets: `process`, `instance`, `delay_ms`, `reason`
    BackoffScheduled,

    /// Restart accepted (operator command or cron tick).
    ///
    /// Sets: `process`, `instance`, `source`
    RestartRequested,

    /// Restart intent dropped because a restart is already in flight.
    ///
    /// Sets: `process`, `instance`, `source`
    RestartCoalesced,

    /// Cron schedule fired for a descriptor.
    ///
    /// Sets: `process`
    CronFired,

    // === Logs ===
    /// A log destination could not be written (output for this chunk is lost).
    ///
    /// Sets: `process`, `instance`, `reason`
    LogWriteFailed,

    // === Runtime ===
    /// Shutdown requested (OS signal or handle).
    ShutdownRequested,

    /// All processes stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some processes did not stop in time.
    ///
    /// Sets: `reason` (stuck instances)
    GraceExceeded,

    /// A subscriber's `on_event` panicked; the subscriber keeps receiving.
    ///
    /// Sets: `process` (subscriber name), `reason`
    SubscriberPanicked,

    /// An event could not be queued for a subscriber.
    ///
    /// Sets: `process` (subscriber name), `reason`
    SubscriberOverflow,
}

/// What asked for a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartSource {
    /// `restart` command (CLI, control socket, handle).
    Operator,
    /// `cron_restart` schedule tick.
    Schedule,
}

impl std::fmt::Display for RestartSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RestartSource::Operator => "operator",
            RestartSource::Schedule => "schedule",
        })
    }
}

/// One supervisor event. Which optional fields are filled depends on [`EventKind`].
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide publication order.
    pub seq: u64,
    /// When the event was created.
    pub at: SystemTime,
    pub kind: EventKind,

    /// Descriptor name (or subscriber name for subscriber events).
    pub process: Option<Arc<str>>,
    /// Instance index within the descriptor.
    pub instance: Option<u32>,
    /// OS process id.
    pub pid: Option<u32>,
    /// Restart counter at the time of the event.
    pub restarts: Option<u32>,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Terminating signal, if the process was killed.
    pub signal: Option<i32>,
    /// Delay before the next attempt in milliseconds.
    pub delay_ms: Option<u32>,
    /// Restart origin for restart events.
    pub source: Option<RestartSource>,
    /// Free-form detail: error text, stuck instances, panic message.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Stamps a new event with the next sequence number and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            process: None,
            instance: None,
            pid: None,
            restarts: None,
            exit_code: None,
            signal: None,
            delay_ms: None,
            source: None,
            reason: None,
        }
    }

    /// Attaches the process name and instance index.
    #[inline]
    pub fn with_process(mut self, name: impl Into<Arc<str>>, instance: u32) -> Self {
        self.process = Some(name.into());
        self.instance = Some(instance);
        self
    }

    /// Attaches the process name only (descriptor-wide events).
    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.process = Some(name.into());
        self
    }

    #[inline]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    #[inline]
    pub fn with_restarts(mut self, n: u32) -> Self {
        self.restarts = Some(n);
        self
    }

    /// Attaches exit code and/or terminating signal.
    #[inline]
    pub fn with_exit(mut self, code: Option<i32>, signal: Option<i32>) -> Self {
        self.exit_code = code;
        self.signal = signal;
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_source(mut self, source: RestartSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_name(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_name(subscriber)
            .with_reason(info)
    }

    /// True if this event concerns `name` (any instance).
    pub fn is_for(&self, name: &str) -> bool {
        self.process.as_deref() == Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::ProcessStarting);
        let b = Event::new(EventKind::ProcessRunning);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builder_fields() {
        let ev = Event::new(EventKind::ProcessCrashed)
            .with_process("snap", 2)
            .with_pid(Some(42))
            .with_exit(None, Some(9));

        assert!(ev.is_for("snap"));
        assert_eq!(ev.instance, Some(2));
        assert_eq!(ev.pid, Some(42));
        assert_eq!(ev.signal, Some(9));
        assert_eq!(ev.exit_code, None);
    }

    #[test]
    fn test_delay_saturates() {
        let ev = Event::new(EventKind::BackoffScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
