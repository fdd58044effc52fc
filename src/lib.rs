//! # procvisor
//!
//! **Procvisor** supervises a small fixed set of long-running OS processes
//! described declaratively: it launches them, restarts them when they crash
//! (with backoff and a restart-storm limit), restarts them on cron schedules and
//! routes their stdout/stderr to append-only log files.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  procvisor.toml ──► DescriptorStore ──► Vec<ProcessDescriptor> + SupervisorConfig
//!                                                │
//!                                                ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │  Supervisor::launch                                                   │
//! │  - Registry: control loop, owns every ManagedProcess (no locks)       │
//! │  - Scheduler: one cron timer per descriptor with cron_restart         │
//! │  - Bus + SubscriberSet: lifecycle events to subscribers               │
//! └──────┬──────────────────────────▲─────────────────────────────┬───────┘
//!        │ launch(instance)         │ Spawned / Exited / ...      │ SupervisorHandle
//!        ▼                          │                             │ (CLI, control socket)
//!   ┌──────────────┐   spawn   ┌────┴─────────┐                   ▼
//!   │InstanceActor ├──────────►│ProcessRunner │            start / stop / restart
//!   │ (one per run)│           └────┬─────────┘            status / shutdown
//!   └──────────────┘                │ stdout / stderr
//!                                   ▼
//!                             ┌──────────┐
//!                             │LogRouter │──► trace.log (O_APPEND)
//!                             └──────────┘
//! ```
//!
//! ### Instance lifecycle
//! ```text
//! Stopped ─start─► Starting ─spawned─► Running ─exit─► Crashed ─backoff─► Starting
//!                                         │                └─ limit ─► Failed
//!                                         └─stop/restart/cron─► Stopping ─► Stopped (─► Starting)
//! ```
//!
//! ## Features
//! | Area               | Description                                          | Key types                                  |
//! |--------------------|------------------------------------------------------|--------------------------------------------|
//! | **Descriptors**    | TOML/JSON documents with pm2 field names             | [`DescriptorStore`], [`ProcessDescriptor`] |
//! | **Supervision**    | State machine, crash restarts, operator commands     | [`Supervisor`], [`SupervisorHandle`]       |
//! | **Policies**       | Exponential backoff with jitter, restart-storm limit | [`BackoffPolicy`], [`RestartLimit`]        |
//! | **Scheduling**     | Five-field cron with coalescing                      | [`CronExpr`], [`CronTrigger`], [`Clock`]   |
//! | **Logs**           | Append-only routing, merge_logs, reopen-on-error     | [`LogRouter`], [`LogPaths`]                |
//! | **Subscriber API** | Hook into lifecycle events                           | [`Subscribe`], [`LogWriter`]               |
//! | **Control**        | Newline-delimited JSON over a Unix socket            | [`control::ControlServer`]                 |
//! | **Errors**         | Typed errors with stable labels                      | [`ConfigError`], [`ControlError`], ...     |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use procvisor::{ConfigSource, DescriptorStore, LogWriter, Subscribe, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = DescriptorStore::load(ConfigSource::Path("procvisor.toml".into()))?;
//!
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let sup = Supervisor::builder(report.supervisor)
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let handle = sup.launch(report.descriptors)?;
//!     handle.start_all().await?;
//!     handle.restart("dsp").await?;
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod control;
mod core;
mod descriptor;
mod error;
mod events;
mod logs;
mod policies;
mod process;
mod schedule;
mod subscribers;

// ---- Public re-exports ----

pub use self::core::{
    ProcessState, ProcessStatus, Supervisor, SupervisorBuilder, SupervisorConfig,
    SupervisorHandle, Target, wait_for_shutdown_signal,
};
pub use descriptor::{ConfigSource, DescriptorStore, LoadReport, MAX_INSTANCES, ProcessDescriptor};
pub use error::{ConfigError, ControlError, ExitError, LogIoError, RuntimeError, SpawnError};
pub use events::{Bus, Event, EventKind, RestartSource};
pub use logs::{LogFile, LogPaths, LogPumps, LogRouter, LogSinks, SharedSink, tail};
pub use policies::{BackoffPolicy, JitterPolicy, RestartHistory, RestartLimit};
pub use process::{ExitInfo, ProcessRunner, RunningProcess};
pub use schedule::{Clock, CronExpr, CronParseError, CronTrigger, ManualClock, Scheduler, SystemClock};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
