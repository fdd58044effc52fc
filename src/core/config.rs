//! # Global runtime configuration.
//!
//! Provides [`SupervisorConfig`], the centralized settings for the supervisor
//! runtime. Values come from [`Default`], optionally overridden by the
//! `[supervisor]` table of the configuration document:
//!
//! ```toml
//! [supervisor]
//! grace = "10s"
//! kill_timeout = "5s"
//! max_restarts = 10
//! restart_window = "60s"
//! log_dir = "logs"
//!
//! [supervisor.backoff]
//! first = "1s"
//! max = "30s"
//! factor = 2.0
//! jitter = "equal"
//! ```
//!
//! Per-descriptor overrides (`kill_timeout`, `max_restarts`, `min_uptime`) are
//! merged with the global values through the `*_for` accessors.
//!
//! ## Sentinel values
//! - `grace = 0s` → do not wait for processes during shutdown
//! - `max_restarts = 0` → never restart after a crash

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::descriptor::ProcessDescriptor;
use crate::descriptor::raw::RawSupervisor;
use crate::error::ConfigError;
use crate::policies::{BackoffPolicy, JitterPolicy, RestartLimit};

/// Global configuration for the supervisor runtime.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Maximum time to wait for all processes to stop during shutdown.
    ///
    /// If exceeded, shutdown returns `RuntimeError::GraceExceeded` listing the
    /// instances that were still alive.
    pub grace: Duration,

    /// Default time between SIGTERM and SIGKILL when stopping one process.
    pub kill_timeout: Duration,

    /// Crash restart delays.
    pub backoff: BackoffPolicy,

    /// Restart-storm limit (`max_restarts` per `window`).
    pub limit: RestartLimit,

    /// A run at least this long resets the consecutive-crash backoff.
    pub min_uptime: Duration,

    /// Capacity of the event bus broadcast ring buffer (min 1).
    pub bus_capacity: usize,

    /// Capacity of the control loop command queue (min 1).
    pub queue_capacity: usize,

    /// Directory for default log files (`<log_dir>/<name>-out.log`).
    pub log_dir: PathBuf,

    /// How long an exited instance waits for its log pumps to drain.
    pub drain_timeout: Duration,

    /// Cron poll resolution.
    pub tick: Duration,

    /// Control socket path used by the daemon and the CLI.
    pub socket: PathBuf,
}

impl SupervisorConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a command queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Termination grace for `desc` (descriptor override or global default).
    #[inline]
    pub fn kill_timeout_for(&self, desc: &ProcessDescriptor) -> Duration {
        desc.kill_timeout().unwrap_or(self.kill_timeout)
    }

    /// Restart limit for `desc`; only `max_restarts` can be overridden.
    #[inline]
    pub fn limit_for(&self, desc: &ProcessDescriptor) -> RestartLimit {
        RestartLimit {
            max_restarts: desc.max_restarts().unwrap_or(self.limit.max_restarts),
            window: self.limit.window,
        }
    }

    /// Backoff reset threshold for `desc`.
    #[inline]
    pub fn min_uptime_for(&self, desc: &ProcessDescriptor) -> Duration {
        desc.min_uptime().unwrap_or(self.min_uptime)
    }

    /// Overrides fields present in the `[supervisor]` table.
    ///
    /// Relative `log_dir`/`socket` paths resolve against `base` (the directory of
    /// the configuration file) when given.
    pub(crate) fn apply(&mut self, raw: RawSupervisor, base: Option<&Path>) -> Result<(), ConfigError> {
        if let Some(d) = raw.grace {
            self.grace = d.resolve("supervisor.grace")?;
        }
        if let Some(d) = raw.kill_timeout {
            self.kill_timeout = d.resolve("supervisor.kill_timeout")?;
        }
        if let Some(b) = raw.backoff {
            if let Some(d) = b.first {
                self.backoff.first = d.resolve("supervisor.backoff.first")?;
            }
            if let Some(d) = b.max {
                self.backoff.max = d.resolve("supervisor.backoff.max")?;
            }
            if let Some(f) = b.factor {
                self.backoff.factor = f;
            }
            if let Some(j) = b.jitter {
                self.backoff.jitter = j
                    .parse::<JitterPolicy>()
                    .map_err(|reason| ConfigError::Parse { reason })?;
            }
        }
        if let Some(n) = raw.max_restarts {
            self.limit.max_restarts = n;
        }
        if let Some(d) = raw.restart_window {
            self.limit.window = d.resolve("supervisor.restart_window")?;
        }
        if let Some(d) = raw.min_uptime {
            self.min_uptime = d.resolve("supervisor.min_uptime")?;
        }
        if let Some(n) = raw.bus_capacity {
            self.bus_capacity = n;
        }
        if let Some(n) = raw.queue_capacity {
            self.queue_capacity = n;
        }
        if let Some(d) = raw.drain_timeout {
            self.drain_timeout = d.resolve("supervisor.drain_timeout")?;
        }
        if let Some(d) = raw.tick {
            self.tick = d.resolve("supervisor.tick")?;
        }
        if let Some(p) = raw.log_dir {
            self.log_dir = rebase(p, base);
        }
        if let Some(p) = raw.socket {
            self.socket = rebase(p, base);
        }
        Ok(())
    }
}

fn rebase(path: PathBuf, base: Option<&Path>) -> PathBuf {
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `grace = 10s`, `kill_timeout = 5s`
    /// - `backoff = BackoffPolicy::default()` (immediate, then 1s, 2s, 4s ... 30s)
    /// - `limit = RestartLimit::default()` (10 restarts per 60s)
    /// - `min_uptime = 1s`
    /// - `bus_capacity = 1024`, `queue_capacity = 256`
    /// - `log_dir = "logs"`, `drain_timeout = 1s`, `tick = 1s`
    /// - `socket = "/tmp/procvisor.sock"`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            kill_timeout: Duration::from_secs(5),
            backoff: BackoffPolicy::default(),
            limit: RestartLimit::default(),
            min_uptime: Duration::from_secs(1),
            bus_capacity: 1024,
            queue_capacity: 256,
            log_dir: PathBuf::from("logs"),
            drain_timeout: Duration::from_secs(1),
            tick: Duration::from_secs(1),
            socket: PathBuf::from("/tmp/procvisor.sock"),
        }
    }
}
