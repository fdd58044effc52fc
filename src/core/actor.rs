//! # InstanceActor: the waiter task of one instance run.
//!
//! One actor is spawned per start. It owns the child handle for the whole run
//! and reports back to the control loop; it never decides about restarts.
//!
//! ```text
//! stop already requested? ─► Exited{exit: None}
//! open log sinks
//! spawn ──err──► SpawnFailed
//!   │ok
//!   ├─► Spawned{pid}
//!   ├─► select! {
//!   │     stop token cancelled ─► terminate(kill_timeout)   (SIGTERM → SIGKILL)
//!   │     child exited         ─► exit status
//!   │   }
//!   ├─► drain log pumps (≤ drain_timeout)
//!   └─► Exited{exit}
//! ```
//!
//! ## Rules
//! - Exactly one terminal report (`SpawnFailed` or `Exited`) per actor.
//! - Every report carries the generation the actor was started for.
//! - The child is reaped on every path (`kill_on_drop` covers aborts and panics).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::command::{Command, InstanceKey};
use crate::descriptor::ProcessDescriptor;
use crate::process::{ExitInfo, ProcessRunner};

/// Timing parameters of one run.
#[derive(Clone, Copy, Debug)]
pub(crate) struct InstanceActorParams {
    /// SIGTERM → SIGKILL grace.
    pub kill_timeout: Duration,
    /// Bound on waiting for the log pumps after exit.
    pub drain_timeout: Duration,
}

/// Supervises one OS process run of one instance.
pub(crate) struct InstanceActor {
    pub desc: Arc<ProcessDescriptor>,
    pub key: InstanceKey,
    pub generation: u64,
    pub params: InstanceActorParams,
    pub runner: ProcessRunner,
    pub tx: mpsc::Sender<Command>,
}

impl InstanceActor {
    /// Runs until the process is gone and the loop has been told.
    pub async fn run(self, stop: CancellationToken) {
        if stop.is_cancelled() {
            self.report_exit(None).await;
            return;
        }

        let sinks = self
            .runner
            .router()
            .open(&self.desc, self.key.instance)
            .await;

        let mut proc = match self.runner.spawn(&self.desc, self.key.instance, &sinks) {
            Ok(proc) => proc,
            Err(error) => {
                let _ = self
                    .tx
                    .send(Command::SpawnFailed {
                        key: self.key.clone(),
                        generation: self.generation,
                        error,
                    })
                    .await;
                return;
            }
        };
        drop(sinks);

        let _ = self
            .tx
            .send(Command::Spawned {
                key: self.key.clone(),
                generation: self.generation,
                pid: proc.pid(),
            })
            .await;

        let exit = tokio::select! {
            biased;
            _ = stop.cancelled() => proc.terminate(self.params.kill_timeout).await,
            exit = proc.wait() => exit,
        };

        if !proc.drain(self.params.drain_timeout).await {
            tracing::debug!(
                process = %self.key.name,
                instance = self.key.instance,
                "log pumps did not drain in time"
            );
        }
        self.report_exit(Some(exit)).await;
    }

    async fn report_exit(&self, exit: Option<ExitInfo>) {
        let _ = self
            .tx
            .send(Command::Exited {
                key: self.key.clone(),
                generation: self.generation,
                exit,
            })
            .await;
    }
}
