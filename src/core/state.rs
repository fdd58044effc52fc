//! Instance state machine and the status snapshot exposed to operators.
//!
//! ```text
//!            start                spawned
//! Stopped ─────────► Starting ─────────────► Running
//!    ▲                  │ │                    │ │
//!    │      stop        │ │ exit / spawn error │ │ stop / restart
//!    └──── Stopping ◄───┘ └──────► Crashed ◄───┘ └──► Stopping ──► Stopped
//!              │                    │   │                             │
//!              │   (restart)        │   └─ limit exhausted ─► Failed  │ (restart)
//!              └──────► Starting ◄──┘ backoff elapsed                 └──► Starting
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::process::ExitInfo;

/// Lifecycle state of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    /// Not running and not scheduled to run.
    Stopped,
    /// Spawn requested; the OS process may not exist yet.
    Starting,
    /// OS process alive.
    Running,
    /// Termination requested, waiting for the exit.
    Stopping,
    /// Exited unexpectedly; a restart is pending (backoff).
    Crashed,
    /// Restart limit exhausted; needs an operator `start`/`restart`.
    Failed,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Stopped => "stopped",
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Stopping => "stopping",
            ProcessState::Crashed => "crashed",
            ProcessState::Failed => "failed",
        }
    }

    /// True while a waiter task (and possibly an OS process) exists.
    pub fn is_alive(&self) -> bool {
        matches!(
            self,
            ProcessState::Starting | ProcessState::Running | ProcessState::Stopping
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub name: String,
    pub instance: u32,
    pub state: ProcessState,
    pub pid: Option<u32>,
    /// Restarts of any kind (crash, cron, operator).
    pub restarts: u32,
    /// Unexpected exits and spawn failures.
    pub crashes: u32,
    pub last_exit: Option<ExitInfo>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_restart_at: Option<DateTime<Utc>>,
}

impl ProcessStatus {
    /// `name#instance`, as used in logs and shutdown reports.
    pub fn label(&self) -> String {
        format!("{}#{}", self.name, self.instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alive_states() {
        let alive: Vec<_> = [
            ProcessState::Stopped,
            ProcessState::Starting,
            ProcessState::Running,
            ProcessState::Stopping,
            ProcessState::Crashed,
            ProcessState::Failed,
        ]
        .into_iter()
        .filter(ProcessState::is_alive)
        .collect();
        assert_eq!(
            alive,
            vec![ProcessState::Starting, ProcessState::Running, ProcessState::Stopping]
        );
    }

    #[test]
    fn test_status_wire_shape() {
        let status = ProcessStatus {
            name: "dsp".into(),
            instance: 1,
            state: ProcessState::Crashed,
            pid: None,
            restarts: 2,
            crashes: 3,
            last_exit: Some(ExitInfo::exited(1)),
            started_at: None,
            last_restart_at: None,
        };
        assert_eq!(status.label(), "dsp#1");

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "crashed");
        assert_eq!(json["last_exit"]["code"], 1);

        let back: ProcessStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, status);
    }
}
