//! Per-instance bookkeeping owned by the control loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::core::command::InstanceKey;
use crate::core::state::{ProcessState, ProcessStatus};
use crate::descriptor::ProcessDescriptor;
use crate::policies::RestartHistory;
use crate::process::ExitInfo;

/// One instance of a descriptor.
pub(crate) struct ManagedProcess {
    pub desc: Arc<ProcessDescriptor>,
    pub instance: u32,
    pub state: ProcessState,
    /// Bumped on every start; stale waiter/timer messages are dropped.
    pub generation: u64,
    /// Cancels the current waiter (stop request).
    pub stop: Option<CancellationToken>,
    /// Cancels the pending backoff timer.
    pub backoff: Option<CancellationToken>,
    /// Start again once the current stop completes (restart in flight).
    pub pending_start: bool,
    pub restarts: u32,
    pub crashes: u32,
    /// Crashes since the last run that lasted `min_uptime`.
    pub consecutive: u32,
    pub history: RestartHistory,
    pub last_exit: Option<ExitInfo>,
    pub pid: Option<u32>,
    pub started: Option<Instant>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_restart_at: Option<DateTime<Utc>>,
}

impl ManagedProcess {
    pub fn new(desc: Arc<ProcessDescriptor>, instance: u32) -> Self {
        Self {
            desc,
            instance,
            state: ProcessState::Stopped,
            generation: 0,
            stop: None,
            backoff: None,
            pending_start: false,
            restarts: 0,
            crashes: 0,
            consecutive: 0,
            history: RestartHistory::new(),
            last_exit: None,
            pid: None,
            started: None,
            started_at: None,
            last_restart_at: None,
        }
    }

    pub fn key(&self) -> InstanceKey {
        InstanceKey {
            name: self.desc.name_arc(),
            instance: self.instance,
        }
    }

    /// How long the last run lasted (zero if it never spawned).
    pub fn uptime(&self) -> Duration {
        self.started.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    /// Counts a restart of any kind.
    pub fn note_restart(&mut self) {
        self.restarts += 1;
        self.last_restart_at = Some(Utc::now());
    }

    /// Clears the crash bookkeeping (operator reset of a `Failed` instance).
    pub fn reset_crash_budget(&mut self) {
        self.history.clear();
        self.consecutive = 0;
    }

    pub fn cancel_backoff(&mut self) {
        if let Some(token) = self.backoff.take() {
            token.cancel();
        }
    }

    pub fn status(&self) -> ProcessStatus {
        ProcessStatus {
            name: self.desc.name().to_string(),
            instance: self.instance,
            state: self.state,
            pid: self.pid,
            restarts: self.restarts,
            crashes: self.crashes,
            last_exit: self.last_exit,
            started_at: self.started_at,
            last_restart_at: self.last_restart_at,
        }
    }
}
