//! # Supervisor: wires the runtime together and drives graceful shutdown.
//!
//! The [`Supervisor`] owns the event bus, the [`SubscriberSet`] and the runtime
//! configuration. [`Supervisor::launch`] turns a set of descriptors into a live
//! control loop and returns the [`SupervisorHandle`] used to drive it.
//!
//! ```text
//! launch(descriptors)
//!   ├─ Registry (control loop task) ◄── mpsc<Command> ◄── SupervisorHandle (clones)
//!   │     └─ InstanceActor per run ──► ProcessRunner ──► LogRouter
//!   ├─ Scheduler: one timer per cron_restart ──► try_send(Restart{Schedule})
//!   └─ Bus ──► subscriber_listener ──► SubscriberSet ──► LogWriter, ...
//!
//! run(descriptors)
//!   launch ─► start_all ─► wait_for_shutdown_signal
//!          ─► ShutdownRequested ─► stop all ─► wait ≤ grace
//!                ├─ all stopped ─► AllStoppedWithin, Ok
//!                └─ timeout     ─► GraceExceeded, Err(stuck instances)
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use procvisor::{LogWriter, ProcessDescriptor, Subscribe, Supervisor, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let sup = Supervisor::builder(SupervisorConfig::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let snap = ProcessDescriptor::new("snap", "snapclient").with_merge_logs(true);
//!     sup.run(vec![snap]).await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::core::{
    SupervisorConfig,
    builder::SupervisorBuilder,
    command::{Command, Target},
    handle::SupervisorHandle,
    registry::Registry,
    shutdown,
};
use crate::descriptor::ProcessDescriptor;
use crate::error::{ConfigError, RuntimeError};
use crate::events::{Bus, Event, EventKind, RestartSource};
use crate::logs::LogRouter;
use crate::process::ProcessRunner;
use crate::schedule::{Clock, CronExpr, Scheduler};
use crate::subscribers::SubscriberSet;

/// Coordinates the control loop, cron timers, event delivery and shutdown.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    clock: Arc<dyn Clock>,
}

impl Supervisor {
    /// Returns a builder; see [`SupervisorBuilder`].
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            clock,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Receives events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Starts the control loop and cron timers for `descriptors`.
    ///
    /// Every instance begins `Stopped`; call [`SupervisorHandle::start_all`] to
    /// launch them. Fails on duplicate names and on the reserved name `"all"`.
    pub fn launch(&self, descriptors: Vec<ProcessDescriptor>) -> Result<SupervisorHandle, ConfigError> {
        let mut seen = HashSet::new();
        for desc in &descriptors {
            if desc.name() == "all" {
                return Err(ConfigError::ReservedName {
                    name: desc.name().to_string(),
                });
            }
            if !seen.insert(desc.name()) {
                return Err(ConfigError::DuplicateName {
                    name: desc.name().to_string(),
                });
            }
        }
        let descriptors: Vec<Arc<ProcessDescriptor>> =
            descriptors.into_iter().map(Arc::new).collect();

        let (tx, rx) = mpsc::channel(self.cfg.queue_capacity_clamped());
        let runner = ProcessRunner::new(LogRouter::new(self.cfg.log_dir.clone(), self.bus.clone()));
        let registry = Registry::new(
            descriptors.clone(),
            self.cfg.clone(),
            self.bus.clone(),
            runner,
            tx.downgrade(),
        );
        tokio::spawn(registry.run(rx));

        let scheduler = Arc::new(Scheduler::new(Arc::clone(&self.clock), self.cfg.tick));
        for desc in &descriptors {
            if let Some(expr) = desc.cron() {
                self.schedule_restarts(&scheduler, desc, expr.clone(), tx.clone());
            }
        }

        tracing::info!(processes = descriptors.len(), "supervisor launched");
        Ok(SupervisorHandle::new(
            tx,
            self.bus.clone(),
            self.cfg.grace,
            scheduler,
        ))
    }

    /// Launches `descriptors`, starts them all and supervises until a termination
    /// signal, then shuts down gracefully.
    pub async fn run(&self, descriptors: Vec<ProcessDescriptor>) -> Result<(), RuntimeError> {
        let handle = self.launch(descriptors)?;
        if let Err(err) = handle.start_all().await {
            tracing::warn!(label = err.as_label(), error = %err, "start_all failed");
        }

        let signal = shutdown::wait_for_shutdown_signal()
            .await
            .map_err(RuntimeError::Signals)?;
        tracing::info!(signal, "termination signal received");
        handle.shutdown().await
    }

    /// Cron firings only enqueue a restart intent; the control loop decides.
    fn schedule_restarts(
        &self,
        scheduler: &Scheduler,
        desc: &ProcessDescriptor,
        expr: CronExpr,
        tx: mpsc::Sender<Command>,
    ) {
        let bus = self.bus.clone();
        scheduler.schedule(desc.name_arc(), expr, move |name| {
            bus.publish(Event::new(EventKind::CronFired).with_name(name));
            let intent = Command::Restart {
                target: Target::Name(name.to_string()),
                source: RestartSource::Schedule,
                reply: None,
            };
            if tx.try_send(intent).is_err() {
                tracing::warn!(process = name, "command queue full, cron restart dropped");
            }
        });
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    pub(crate) fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(ev),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}
