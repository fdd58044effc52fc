//! # LogWriter: renders supervisor events as `tracing` records
//!
//! The default subscriber installed by the `procvisor` binary. Every event becomes
//! one structured record at a level matching its severity:
//!
//! ```text
//! INFO  process="dsp" instance=0 pid=4242 running
//! WARN  process="snap" instance=0 exit_code=1 reason="exited with code 1" crashed
//! INFO  process="snap" instance=0 delay_ms=2000 restart scheduled
//! ERROR process="snap" instance=0 reason="10 restarts within 60s" failed, manual reset required
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let process = e.process.as_deref().unwrap_or("-");
        let instance = e.instance.unwrap_or(0);
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ProcessStarting => {
                tracing::info!(process, instance, restarts = e.restarts, "starting");
            }
            EventKind::ProcessRunning => {
                tracing::info!(process, instance, pid = e.pid, "running");
            }
            EventKind::SpawnFailed => {
                tracing::warn!(process, instance, reason, "spawn failed");
            }
            EventKind::ProcessCrashed => {
                tracing::warn!(
                    process,
                    instance,
                    exit_code = e.exit_code,
                    signal = e.signal,
                    reason,
                    "crashed"
                );
            }
            EventKind::ProcessFailed => {
                tracing::error!(process, instance, reason, "failed, manual reset required");
            }
            EventKind::StopRequested => {
                tracing::info!(process, instance, pid = e.pid, "stopping");
            }
            EventKind::ProcessStopped => {
                tracing::info!(
                    process,
                    instance,
                    exit_code = e.exit_code,
                    signal = e.signal,
                    "stopped"
                );
            }
            EventKind::BackoffScheduled => {
                tracing::info!(process, instance, delay_ms = e.delay_ms, reason, "restart scheduled");
            }
            EventKind::RestartRequested => {
                tracing::info!(process, instance, source = ?e.source, "restart requested");
            }
            EventKind::RestartCoalesced => {
                tracing::debug!(process, instance, source = ?e.source, "restart already in flight");
            }
            EventKind::CronFired => {
                tracing::info!(process, "cron restart fired");
            }
            EventKind::LogWriteFailed => {
                tracing::warn!(process, instance, reason, "log write failed");
            }
            EventKind::ShutdownRequested => {
                tracing::info!("shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!("all processes stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::error!(stuck = reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = process, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(subscriber = process, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
