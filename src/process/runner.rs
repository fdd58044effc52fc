//! # Process Runner: one OS process per call.
//!
//! ```text
//! spawn(desc, instance, sinks)
//!   ├─ cwd missing        ─► SpawnError::WorkingDirMissing
//!   ├─ Command::spawn err ─► SpawnError::{ExecutableNotFound, PermissionDenied, Io}
//!   └─ ok ─► RunningProcess { child, pid, pumps }     (stdout/stderr → LogRouter)
//!
//! wait()             ─► ExitInfo                     (waiter task only)
//! terminate(grace)   ─► SIGTERM ─► wait ≤ grace ─► SIGKILL ─► ExitInfo
//! ```
//!
//! The child is spawned with `kill_on_drop`, so a handle dropped on any path
//! (panic, aborted waiter) still kills and reaps it.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};

use crate::descriptor::ProcessDescriptor;
use crate::error::SpawnError;
use crate::logs::{LogPumps, LogRouter, LogSinks};

use super::exit::ExitInfo;

/// Spawns descriptor instances with their output routed to log files.
#[derive(Clone)]
pub struct ProcessRunner {
    router: LogRouter,
}

impl ProcessRunner {
    pub fn new(router: LogRouter) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &LogRouter {
        &self.router
    }

    /// Spawns `instance` of `desc` and starts pumping its output into `sinks`.
    ///
    /// Returns as soon as the OS process exists.
    pub fn spawn(
        &self,
        desc: &ProcessDescriptor,
        instance: u32,
        sinks: &LogSinks,
    ) -> Result<RunningProcess, SpawnError> {
        if let Some(cwd) = desc.cwd() {
            if !cwd.is_dir() {
                return Err(SpawnError::WorkingDirMissing {
                    cwd: cwd.to_path_buf(),
                });
            }
        }

        let program = desc.program();
        let mut cmd = Command::new(&program);
        cmd.args(desc.args())
            .envs(desc.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = desc.cwd() {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .map_err(|err| SpawnError::from_io(program, err))?;
        let pid = child.id();
        let pumps = self.router.attach(&mut child, sinks, desc.name_arc(), instance);

        Ok(RunningProcess {
            child,
            pid,
            pumps: Some(pumps),
            started: Instant::now(),
        })
    }
}

/// A live child process and its log pumps.
pub struct RunningProcess {
    child: Child,
    pid: Option<u32>,
    pumps: Option<LogPumps>,
    started: Instant,
}

impl RunningProcess {
    /// OS process id.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// When the process was spawned.
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Waits until the process exits.
    pub async fn wait(&mut self) -> ExitInfo {
        match self.child.wait().await {
            Ok(status) => status.into(),
            Err(err) => {
                tracing::warn!(pid = self.pid, error = %err, "wait failed");
                ExitInfo::UNKNOWN
            }
        }
    }

    /// Sends SIGTERM, waits up to `grace`, then SIGKILLs. Always reaps the child.
    pub async fn terminate(&mut self, grace: Duration) -> ExitInfo {
        if let Ok(Some(status)) = self.child.try_wait() {
            return status.into();
        }

        self.send_sigterm();
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => return status.into(),
            Ok(Err(err)) => tracing::warn!(pid = self.pid, error = %err, "wait failed"),
            Err(_) => tracing::warn!(pid = self.pid, grace = ?grace, "did not exit after SIGTERM, killing"),
        }

        if let Err(err) = self.child.kill().await {
            tracing::warn!(pid = self.pid, error = %err, "kill failed");
        }
        self.wait().await
    }

    /// Waits for the log pumps to reach EOF (bounded by `timeout`).
    pub async fn drain(&mut self, timeout: Duration) -> bool {
        match self.pumps.take() {
            Some(pumps) => pumps.drain(timeout).await,
            None => true,
        }
    }

    #[cfg(unix)]
    fn send_sigterm(&self) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Some(pid) = self.pid else { return };
        let Ok(raw) = i32::try_from(pid) else { return };
        if let Err(err) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
            tracing::debug!(pid, error = %err, "SIGTERM not delivered");
        }
    }

    #[cfg(not(unix))]
    fn send_sigterm(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Bus;

    fn runner(dir: &std::path::Path) -> ProcessRunner {
        ProcessRunner::new(LogRouter::new(dir, Bus::new(16)))
    }

    fn sh(name: &str, script: &str) -> ProcessDescriptor {
        ProcessDescriptor::new(name, "/bin/sh").with_args(["-c", script])
    }

    #[tokio::test]
    async fn test_spawn_wait_and_route_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());
        let desc = sh("echo", "echo out; echo err >&2; exit 3");

        let sinks = runner.router().open(&desc, 0).await;
        let mut proc = runner.spawn(&desc, 0, &sinks).unwrap();
        assert!(proc.pid().is_some());

        assert_eq!(proc.wait().await, ExitInfo::exited(3));
        assert!(proc.drain(Duration::from_secs(2)).await);

        let out = std::fs::read_to_string(dir.path().join("echo-out.log")).unwrap();
        let err = std::fs::read_to_string(dir.path().join("echo-error.log")).unwrap();
        assert_eq!(out, "out\n");
        assert_eq!(err, "err\n");
    }

    #[tokio::test]
    async fn test_env_args_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());
        let desc = sh("env", "echo \"$GREETING $(pwd)\"")
            .with_env("GREETING", "hello")
            .with_cwd(dir.path())
            .with_out_file("env.log");

        let sinks = runner.router().open(&desc, 0).await;
        let mut proc = runner.spawn(&desc, 0, &sinks).unwrap();
        assert_eq!(proc.wait().await, ExitInfo::exited(0));
        proc.drain(Duration::from_secs(2)).await;

        let out = std::fs::read_to_string(dir.path().join("env.log")).unwrap();
        let cwd = dir.path().canonicalize().unwrap();
        assert_eq!(out.trim(), format!("hello {}", cwd.display()));
    }

    #[tokio::test]
    async fn test_terminate_graceful_and_forced() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());

        let polite = sh("polite", "exec sleep 30");
        let sinks = runner.router().open(&polite, 0).await;
        let mut proc = runner.spawn(&polite, 0, &sinks).unwrap();
        let exit = proc.terminate(Duration::from_secs(5)).await;
        assert_eq!(exit, ExitInfo::killed(15));

        let stubborn = sh("stubborn", "trap '' TERM; echo ready; while true; do sleep 0.05; done");
        let sinks = runner.router().open(&stubborn, 0).await;
        let mut proc = runner.spawn(&stubborn, 0, &sinks).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let exit = proc.terminate(Duration::from_millis(300)).await;
        assert_eq!(exit, ExitInfo::killed(9));
    }

    #[tokio::test]
    async fn test_spawn_errors() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());

        let missing = ProcessDescriptor::new("missing", "/nonexistent/bin/worker");
        let sinks = runner.router().open(&missing, 0).await;
        let err = runner.spawn(&missing, 0, &sinks).err().unwrap();
        assert_eq!(err.as_label(), "spawn_not_found");

        let no_cwd = ProcessDescriptor::new("nocwd", "/bin/true").with_cwd(dir.path().join("gone"));
        let sinks = runner.router().open(&no_cwd, 0).await;
        let err = runner.spawn(&no_cwd, 0, &sinks).err().unwrap();
        assert_eq!(err.as_label(), "spawn_cwd_missing");
    }
}
