//! # SupervisorHandle: the operator API of a launched supervisor.
//!
//! Cheap to clone; every method enqueues one command on the control loop and
//! waits for its reply. All lifecycle operations are idempotent, and a name of
//! `"all"` targets every descriptor.
//!
//! | call          | Stopped  | Running           | Crashed        | Failed          |
//! |---------------|----------|-------------------|----------------|-----------------|
//! | `start`       | start    | no-op             | no-op          | reset + start   |
//! | `stop`        | no-op    | SIGTERM → Stopped | cancel backoff | → Stopped       |
//! | `restart`     | start    | stop, then start  | coalesced      | reset + start   |
//!
//! Replies carry the status of every targeted instance right after the command
//! was applied (a `stop` replies with `stopping`, not `stopped`).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::core::command::{Command, Reply, Target};
use crate::core::state::ProcessStatus;
use crate::error::{ControlError, RuntimeError};
use crate::events::{Bus, Event, EventKind, RestartSource};
use crate::schedule::Scheduler;

/// Handle to a running supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Command>,
    bus: Bus,
    grace: Duration,
    scheduler: Arc<Scheduler>,
}

impl SupervisorHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<Command>,
        bus: Bus,
        grace: Duration,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            tx,
            bus,
            grace,
            scheduler,
        }
    }

    /// Starts every instance of `name`.
    pub async fn start(&self, name: &str) -> Result<Vec<ProcessStatus>, ControlError> {
        let target = Target::parse(name);
        self.call(|reply| Command::Start { target, reply }).await
    }

    /// Stops every instance of `name` (SIGTERM, SIGKILL after `kill_timeout`).
    pub async fn stop(&self, name: &str) -> Result<Vec<ProcessStatus>, ControlError> {
        let target = Target::parse(name);
        self.call(|reply| Command::Stop { target, reply }).await
    }

    /// Restarts every instance of `name`.
    pub async fn restart(&self, name: &str) -> Result<Vec<ProcessStatus>, ControlError> {
        let target = Target::parse(name);
        self.call(|reply| Command::Restart {
            target,
            source: RestartSource::Operator,
            reply: Some(reply),
        })
        .await
    }

    /// Status of every instance of `name`.
    pub async fn status(&self, name: &str) -> Result<Vec<ProcessStatus>, ControlError> {
        let target = Target::parse(name);
        self.call(|reply| Command::Status { target, reply }).await
    }

    pub async fn start_all(&self) -> Result<Vec<ProcessStatus>, ControlError> {
        self.call(|reply| Command::Start {
            target: Target::All,
            reply,
        })
        .await
    }

    pub async fn stop_all(&self) -> Result<Vec<ProcessStatus>, ControlError> {
        self.call(|reply| Command::Stop {
            target: Target::All,
            reply,
        })
        .await
    }

    /// Status of every managed instance, ordered by name then instance.
    pub async fn list(&self) -> Result<Vec<ProcessStatus>, ControlError> {
        self.call(|reply| Command::Status {
            target: Target::All,
            reply,
        })
        .await
    }

    /// Receives events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Stops everything and waits up to the configured grace.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] naming the instances still alive
    /// when the grace ran out. New starts are refused from here on.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.scheduler.shutdown();

        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { reply: tx }).await.is_err() {
            // Control loop already gone: nothing left alive.
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            return Ok(());
        }

        match tokio::time::timeout(self.grace, rx).await {
            Ok(_) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck: Vec<String> = self
                    .list()
                    .await
                    .unwrap_or_default()
                    .iter()
                    .filter(|s| s.state.is_alive())
                    .map(ProcessStatus::label)
                    .collect();
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
                Err(RuntimeError::GraceExceeded {
                    grace: self.grace,
                    stuck,
                })
            }
        }
    }

    async fn call<F>(&self, make: F) -> Result<Vec<ProcessStatus>, ControlError>
    where
        F: FnOnce(Reply) -> Command,
    {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .await
            .map_err(|_| ControlError::Closed)?;
        rx.await.map_err(|_| ControlError::Closed)?
    }
}
