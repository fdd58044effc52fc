//! # Process descriptor: static configuration of one managed program.
//!
//! A [`ProcessDescriptor`] is immutable once loaded and shared (`Arc`) by every
//! instance it backs. It is built either by the [`DescriptorStore`](crate::DescriptorStore)
//! or programmatically:
//!
//! ```rust
//! use procvisor::{CronExpr, ProcessDescriptor};
//!
//! let dsp = ProcessDescriptor::new("dsp", "./respeaker_core")
//!     .with_cwd("/opt/respeaker/build")
//!     .with_out_file("./trace.log")
//!     .with_merge_logs(true)
//!     .with_cron(CronExpr::parse("0 * * * *").unwrap());
//!
//! assert_eq!(dsp.name(), "dsp");
//! assert_eq!(dsp.instances(), 1);
//! assert_eq!(dsp.program(), std::path::PathBuf::from("/opt/respeaker/build/./respeaker_core"));
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::schedule::CronExpr;

/// Upper bound on `instances` per descriptor.
pub const MAX_INSTANCES: u32 = 1024;

/// Static configuration of one managed program.
#[derive(Clone, Debug)]
pub struct ProcessDescriptor {
    name: Arc<str>,
    command: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
    instances: u32,
    cron: Option<CronExpr>,
    out_file: Option<PathBuf>,
    error_file: Option<PathBuf>,
    merge_logs: bool,
    kill_timeout: Option<Duration>,
    max_restarts: Option<u32>,
    min_uptime: Option<Duration>,
}

impl ProcessDescriptor {
    /// Creates a descriptor with one instance, no schedule and default log files.
    pub fn new(name: impl Into<Arc<str>>, command: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            instances: 1,
            cron: None,
            out_file: None,
            error_file: None,
            merge_logs: false,
            kill_timeout: None,
            max_restarts: None,
            min_uptime: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Sets the instance count, clamped to `1..=MAX_INSTANCES`.
    pub fn with_instances(mut self, n: u32) -> Self {
        self.instances = n.clamp(1, MAX_INSTANCES);
        self
    }

    pub fn with_cron(mut self, expr: CronExpr) -> Self {
        self.cron = Some(expr);
        self
    }

    pub fn with_out_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.out_file = Some(path.into());
        self
    }

    pub fn with_error_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_file = Some(path.into());
        self
    }

    /// When set, stderr goes to the stdout destination and `error_file` is ignored.
    pub fn with_merge_logs(mut self, merge: bool) -> Self {
        self.merge_logs = merge;
        self
    }

    /// Overrides the supervisor's termination grace for this program.
    pub fn with_kill_timeout(mut self, d: Duration) -> Self {
        self.kill_timeout = Some(d);
        self
    }

    /// Overrides the supervisor's restart-storm limit for this program.
    pub fn with_max_restarts(mut self, n: u32) -> Self {
        self.max_restarts = Some(n);
        self
    }

    /// Overrides the run length after which the crash backoff resets.
    pub fn with_min_uptime(mut self, d: Duration) -> Self {
        self.min_uptime = Some(d);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared name handle (cheap to clone into events).
    #[inline]
    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Command as configured.
    #[inline]
    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Executable to spawn.
    ///
    /// A relative path with more than one component (`./bin/worker`) is taken
    /// relative to the working directory; a bare name is looked up on `PATH`.
    pub fn program(&self) -> PathBuf {
        match &self.cwd {
            Some(cwd) if self.command.is_relative() && self.command.components().count() > 1 => {
                cwd.join(&self.command)
            }
            _ => self.command.clone(),
        }
    }

    #[inline]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[inline]
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Configured working directory; `None` means the supervisor's own.
    #[inline]
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    #[inline]
    pub fn instances(&self) -> u32 {
        self.instances
    }

    #[inline]
    pub fn cron(&self) -> Option<&CronExpr> {
        self.cron.as_ref()
    }

    #[inline]
    pub fn out_file(&self) -> Option<&Path> {
        self.out_file.as_deref()
    }

    /// Configured stderr destination; meaningless when `merge_logs` is set.
    #[inline]
    pub fn error_file(&self) -> Option<&Path> {
        self.error_file.as_deref()
    }

    #[inline]
    pub fn merge_logs(&self) -> bool {
        self.merge_logs
    }

    #[inline]
    pub fn kill_timeout(&self) -> Option<Duration> {
        self.kill_timeout
    }

    #[inline]
    pub fn max_restarts(&self) -> Option<u32> {
        self.max_restarts
    }

    #[inline]
    pub fn min_uptime(&self) -> Option<Duration> {
        self.min_uptime
    }

    /// Crashes are always restarted (subject to the restart limit).
    #[inline]
    pub fn restart_on_crash(&self) -> bool {
        true
    }
}
