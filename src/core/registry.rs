//! # Registry: the control loop that owns every managed instance.
//!
//! All lifecycle decisions happen here, one [`Command`] at a time. Nothing else
//! holds a reference to a [`ManagedProcess`], so there is no locking.
//!
//! ```text
//! handle / socket / cron ──┐
//! instance actors ─────────┼──► mpsc<Command> ──► Registry::run()
//! backoff timers ──────────┘                         ├─ state machine (state.rs)
//!                                                    ├─ restart policy (backoff + limit)
//!                                                    └─ publish(Event) ──► Bus
//! ```
//!
//! ## Rules
//! - A crash is any exit that was not requested by a stop, including code 0.
//! - The first crash after a healthy run restarts immediately; later consecutive
//!   crashes back off exponentially. A run of at least `min_uptime` resets the streak.
//! - At most `max_restarts` crash restarts per `restart_window`; the next crash
//!   moves the instance to `Failed` until an operator `start`/`restart`.
//! - Restart intents coalesce: while one restart is in flight (`Starting`,
//!   `Crashed` with backoff pending, `Stopping` with a pending start) further
//!   intents only emit `RestartCoalesced`.
//! - Cron restarts only apply to running instances.
//! - During shutdown nothing is (re)started.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::core::actor::{InstanceActor, InstanceActorParams};
use crate::core::command::{Command, InstanceKey, Target};
use crate::core::config::SupervisorConfig;
use crate::core::managed::ManagedProcess;
use crate::core::state::{ProcessState, ProcessStatus};
use crate::descriptor::ProcessDescriptor;
use crate::error::ControlError;
use crate::events::{Bus, Event, EventKind, RestartSource};
use crate::process::{ExitInfo, ProcessRunner};

/// Everything the transition functions need besides the instance itself.
struct Ctx {
    cfg: SupervisorConfig,
    bus: Bus,
    runner: ProcessRunner,
    tx: mpsc::WeakSender<Command>,
    shutting_down: bool,
}

/// Control loop state.
pub(crate) struct Registry {
    procs: BTreeMap<String, Vec<ManagedProcess>>,
    ctx: Ctx,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
}

impl Registry {
    /// Creates the registry with every instance `Stopped`.
    pub fn new(
        descriptors: Vec<Arc<ProcessDescriptor>>,
        cfg: SupervisorConfig,
        bus: Bus,
        runner: ProcessRunner,
        tx: mpsc::WeakSender<Command>,
    ) -> Self {
        let procs = descriptors
            .into_iter()
            .map(|desc| {
                let instances = (0..desc.instances())
                    .map(|i| ManagedProcess::new(Arc::clone(&desc), i))
                    .collect();
                (desc.name().to_string(), instances)
            })
            .collect();

        Self {
            procs,
            ctx: Ctx {
                cfg,
                bus,
                runner,
                tx,
                shutting_down: false,
            },
            shutdown_waiters: Vec::new(),
        }
    }

    /// Processes commands until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
        }
        tracing::debug!("control loop finished");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Start { target, reply } => {
                let res = self.guarded(&target, |ctx, p| ctx.start(p));
                let _ = reply.send(res);
            }
            Command::Stop { target, reply } => {
                let res = self.apply(&target, |ctx, p| ctx.stop(p));
                let _ = reply.send(res);
                self.check_shutdown();
            }
            Command::Restart {
                target,
                source,
                reply,
            } => {
                let res = self.guarded(&target, |ctx, p| ctx.restart(p, source));
                if let Some(reply) = reply {
                    let _ = reply.send(res);
                }
            }
            Command::Status { target, reply } => {
                let _ = reply.send(self.apply(&target, |_, _| {}));
            }
            Command::Shutdown { reply } => self.begin_shutdown(reply),

            Command::Spawned {
                key,
                generation,
                pid,
            } => self.with_instance(&key, generation, |ctx, p| ctx.on_spawned(p, pid)),
            Command::SpawnFailed {
                key,
                generation,
                error,
            } => self.with_instance(&key, generation, |ctx, p| {
                ctx.on_spawn_failed(p, error.to_string())
            }),
            Command::Exited {
                key,
                generation,
                exit,
            } => self.with_instance(&key, generation, |ctx, p| ctx.on_exited(p, exit)),
            Command::BackoffElapsed { key, generation } => {
                self.with_instance(&key, generation, |ctx, p| ctx.on_backoff_elapsed(p))
            }
        }
    }

    /// Like [`apply`](Self::apply) but refused while shutting down.
    fn guarded<F>(&mut self, target: &Target, f: F) -> Result<Vec<ProcessStatus>, ControlError>
    where
        F: FnMut(&Ctx, &mut ManagedProcess),
    {
        if self.ctx.shutting_down {
            return Err(ControlError::ShuttingDown);
        }
        self.apply(target, f)
    }

    /// Applies `f` to every instance of `target` and returns their statuses.
    fn apply<F>(&mut self, target: &Target, mut f: F) -> Result<Vec<ProcessStatus>, ControlError>
    where
        F: FnMut(&Ctx, &mut ManagedProcess),
    {
        let Registry { procs, ctx, .. } = self;
        let mut out = Vec::new();
        match target {
            Target::All => {
                for p in procs.values_mut().flatten() {
                    f(ctx, p);
                    out.push(p.status());
                }
            }
            Target::Name(name) => {
                let group = procs
                    .get_mut(name.as_str())
                    .ok_or_else(|| ControlError::NotFound { name: name.clone() })?;
                for p in group.iter_mut() {
                    f(ctx, p);
                    out.push(p.status());
                }
            }
        }
        Ok(out)
    }

    /// Runs `f` on the instance if `generation` is still current.
    fn with_instance<F>(&mut self, key: &InstanceKey, generation: u64, f: F)
    where
        F: FnOnce(&Ctx, &mut ManagedProcess),
    {
        let Registry { procs, ctx, .. } = self;
        let current = procs
            .get_mut(&*key.name)
            .and_then(|group| group.get_mut(key.instance as usize))
            .filter(|p| p.generation == generation);
        match current {
            Some(p) => f(ctx, p),
            None => tracing::trace!(process = %key.name, instance = key.instance, generation, "stale report dropped"),
        }
        self.check_shutdown();
    }

    fn begin_shutdown(&mut self, reply: oneshot::Sender<()>) {
        self.ctx.shutting_down = true;
        self.shutdown_waiters.push(reply);

        let Registry { procs, ctx, .. } = self;
        for p in procs.values_mut().flatten() {
            p.pending_start = false;
            match p.state {
                ProcessState::Starting | ProcessState::Running => ctx.begin_stop(p),
                ProcessState::Crashed => {
                    p.cancel_backoff();
                    ctx.settle_stopped(p, None);
                }
                ProcessState::Stopping | ProcessState::Stopped | ProcessState::Failed => {}
            }
        }
        self.check_shutdown();
    }

    fn check_shutdown(&mut self) {
        if !self.ctx.shutting_down || self.shutdown_waiters.is_empty() {
            return;
        }
        if self.procs.values().flatten().any(|p| p.state.is_alive()) {
            return;
        }
        for waiter in self.shutdown_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

impl Ctx {
    fn event(&self, kind: EventKind, p: &ManagedProcess) -> Event {
        Event::new(kind).with_process(p.desc.name_arc(), p.instance)
    }

    // === Operator intents ===

    fn start(&self, p: &mut ManagedProcess) {
        match p.state {
            ProcessState::Stopped => self.launch(p),
            ProcessState::Failed => {
                p.reset_crash_budget();
                self.launch(p);
            }
            ProcessState::Stopping => p.pending_start = true,
            ProcessState::Starting | ProcessState::Running | ProcessState::Crashed => {}
        }
    }

    fn stop(&self, p: &mut ManagedProcess) {
        p.pending_start = false;
        match p.state {
            ProcessState::Starting | ProcessState::Running => self.begin_stop(p),
            ProcessState::Crashed | ProcessState::Failed => {
                p.cancel_backoff();
                self.settle_stopped(p, None);
            }
            ProcessState::Stopping | ProcessState::Stopped => {}
        }
    }

    fn restart(&self, p: &mut ManagedProcess, source: RestartSource) {
        let in_flight = match p.state {
            ProcessState::Starting | ProcessState::Crashed => true,
            ProcessState::Stopping => p.pending_start,
            _ => false,
        };
        if in_flight {
            self.bus
                .publish(self.event(EventKind::RestartCoalesced, p).with_source(source));
            return;
        }

        match (p.state, source) {
            (ProcessState::Running, _) => {
                p.note_restart();
                p.pending_start = true;
                self.publish_restart(p, source);
                self.begin_stop(p);
            }
            (ProcessState::Stopping, RestartSource::Operator) => {
                p.note_restart();
                p.pending_start = true;
                self.publish_restart(p, source);
            }
            (ProcessState::Stopped | ProcessState::Failed, RestartSource::Operator) => {
                if p.state == ProcessState::Failed {
                    p.reset_crash_budget();
                }
                p.note_restart();
                self.publish_restart(p, source);
                self.launch(p);
            }
            (state, RestartSource::Schedule) => {
                tracing::debug!(process = p.desc.name(), instance = p.instance, %state, "cron restart skipped");
            }
            _ => {}
        }
    }

    fn publish_restart(&self, p: &ManagedProcess, source: RestartSource) {
        self.bus.publish(
            self.event(EventKind::RestartRequested, p)
                .with_source(source)
                .with_restarts(p.restarts),
        );
    }

    // === Transitions ===

    /// `→ Starting`: spawns a new actor generation.
    fn launch(&self, p: &mut ManagedProcess) {
        p.cancel_backoff();
        p.generation += 1;
        p.state = ProcessState::Starting;
        p.pid = None;
        p.started = None;

        let token = CancellationToken::new();
        p.stop = Some(token.clone());
        self.bus
            .publish(self.event(EventKind::ProcessStarting, p).with_restarts(p.restarts));

        let Some(tx) = self.tx.upgrade() else {
            tracing::warn!(process = p.desc.name(), instance = p.instance, "control loop closing, start dropped");
            p.stop = None;
            p.state = ProcessState::Stopped;
            return;
        };

        let key = p.key();
        let generation = p.generation;
        let actor = InstanceActor {
            desc: Arc::clone(&p.desc),
            key: key.clone(),
            generation,
            params: InstanceActorParams {
                kill_timeout: self.cfg.kill_timeout_for(&p.desc),
                drain_timeout: self.cfg.drain_timeout,
            },
            runner: self.runner.clone(),
            tx: tx.clone(),
        };

        let join = tokio::spawn(actor.run(token));
        tokio::spawn(async move {
            if let Err(err) = join.await {
                if err.is_panic() {
                    tracing::error!(process = %key.name, instance = key.instance, "instance actor panicked");
                    let _ = tx
                        .send(Command::Exited {
                            key,
                            generation,
                            exit: None,
                        })
                        .await;
                }
            }
        });
    }

    /// `→ Stopping`: asks the actor to terminate the child.
    fn begin_stop(&self, p: &mut ManagedProcess) {
        p.state = ProcessState::Stopping;
        self.bus
            .publish(self.event(EventKind::StopRequested, p).with_pid(p.pid));
        if let Some(token) = &p.stop {
            token.cancel();
        }
    }

    /// `→ Stopped`.
    fn settle_stopped(&self, p: &mut ManagedProcess, exit: Option<ExitInfo>) {
        p.state = ProcessState::Stopped;
        let exit = exit.unwrap_or_default();
        self.bus
            .publish(self.event(EventKind::ProcessStopped, p).with_exit(exit.code, exit.signal));
    }

    /// Stop confirmed; continues into a pending restart.
    fn finish_stop(&self, p: &mut ManagedProcess, exit: Option<ExitInfo>) {
        self.settle_stopped(p, exit);
        let restart = std::mem::take(&mut p.pending_start);
        if restart && !self.shutting_down {
            self.launch(p);
        }
    }

    // === Actor and timer reports ===

    fn on_spawned(&self, p: &mut ManagedProcess, pid: Option<u32>) {
        p.pid = pid;
        p.started = Some(Instant::now());
        p.started_at = Some(Utc::now());
        if p.state == ProcessState::Starting {
            p.state = ProcessState::Running;
            self.bus
                .publish(self.event(EventKind::ProcessRunning, p).with_pid(pid));
        }
    }

    fn on_spawn_failed(&self, p: &mut ManagedProcess, reason: String) {
        p.stop = None;
        self.bus
            .publish(self.event(EventKind::SpawnFailed, p).with_reason(reason.as_str()));
        match p.state {
            ProcessState::Stopping => self.finish_stop(p, None),
            ProcessState::Starting if self.shutting_down => self.settle_stopped(p, None),
            ProcessState::Starting => self.on_crash(p, None, reason),
            _ => {}
        }
    }

    fn on_exited(&self, p: &mut ManagedProcess, exit: Option<ExitInfo>) {
        if !p.state.is_alive() {
            return;
        }
        p.stop = None;
        p.pid = None;
        if exit.is_some() {
            p.last_exit = exit;
        }

        match p.state {
            ProcessState::Stopping => self.finish_stop(p, exit),
            _ if self.shutting_down => self.settle_stopped(p, exit),
            _ => {
                let reason = match exit {
                    Some(exit) => exit.to_error().to_string(),
                    None => "instance actor lost".to_string(),
                };
                self.on_crash(p, exit, reason);
            }
        }
    }

    fn on_backoff_elapsed(&self, p: &mut ManagedProcess) {
        if p.state != ProcessState::Crashed {
            return;
        }
        p.backoff = None;
        p.note_restart();
        self.launch(p);
    }

    /// `→ Crashed`, then restart (now or after backoff) or `→ Failed`.
    fn on_crash(&self, p: &mut ManagedProcess, exit: Option<ExitInfo>, reason: String) {
        p.crashes += 1;
        if p.uptime() >= self.cfg.min_uptime_for(&p.desc) {
            p.consecutive = 0;
        }
        p.consecutive += 1;
        p.state = ProcessState::Crashed;

        let exit_info = exit.unwrap_or_default();
        self.bus.publish(
            self.event(EventKind::ProcessCrashed, p)
                .with_exit(exit_info.code, exit_info.signal)
                .with_reason(reason.as_str()),
        );

        let limit = self.cfg.limit_for(&p.desc);
        if !p.history.admit(&limit, Instant::now()) {
            p.state = ProcessState::Failed;
            self.bus.publish(self.event(EventKind::ProcessFailed, p).with_reason(format!(
                "{} restarts within {:?}; last: {reason}",
                limit.max_restarts, limit.window
            )));
            return;
        }

        let delay = self.cfg.backoff.crash_delay(p.consecutive);
        if delay.is_zero() {
            p.note_restart();
            self.launch(p);
            return;
        }

        self.bus.publish(
            self.event(EventKind::BackoffScheduled, p)
                .with_delay(delay)
                .with_reason(reason),
        );

        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        let token = CancellationToken::new();
        p.backoff = Some(token.clone());
        let key = p.key();
        let generation = p.generation;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(Command::BackoffElapsed { key, generation }).await;
                }
            }
        });
    }
}
