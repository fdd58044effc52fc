//! # Log Router: child output → append-only files.
//!
//! ```text
//! open(desc, instance) ──► LogSinks { stdout, stderr }     (merged: same sink twice)
//!
//! attach(child, sinks)
//!   child.stdout ──► pump ──► stdout sink
//!   child.stderr ──► pump ──► stderr sink
//!                     └─ write error ─► LogWriteFailed (once per failure streak)
//!
//! LogPumps::drain(timeout) ── after exit: wait for EOF, then abort stragglers
//! ```
//!
//! Output is copied as raw chunks in the order the OS hands them over; lines are
//! never reassembled. With `merge_logs` the interleaving of stdout and stderr is
//! the order in which the two pumps acquire the shared sink.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;

use crate::descriptor::ProcessDescriptor;
use crate::events::{Bus, Event, EventKind};

use super::paths::LogPaths;
use super::sink::{LogFile, SharedSink};

const CHUNK: usize = 8 * 1024;

/// Open destinations of one instance.
pub struct LogSinks {
    /// Sink receiving stdout.
    pub stdout: SharedSink,
    /// Sink receiving stderr (the stdout sink when merged).
    pub stderr: SharedSink,
    /// The resolved paths.
    pub paths: LogPaths,
}

/// Pump tasks of one running instance.
pub struct LogPumps {
    handles: Vec<JoinHandle<()>>,
}

impl LogPumps {
    /// Waits for both streams to reach EOF, up to `timeout`; then aborts the pumps.
    ///
    /// Returns `true` when everything was drained. A grandchild that inherited the
    /// pipes can keep them open after the child died; that is what the timeout is for.
    pub async fn drain(self, timeout: Duration) -> bool {
        let aborts: Vec<_> = self.handles.iter().map(JoinHandle::abort_handle).collect();
        let joined = tokio::time::timeout(timeout, futures::future::join_all(self.handles)).await;
        if joined.is_err() {
            for abort in aborts {
                abort.abort();
            }
            return false;
        }
        true
    }
}

/// Routes child output of every instance to its log files.
#[derive(Clone)]
pub struct LogRouter {
    log_dir: PathBuf,
    bus: Bus,
}

impl LogRouter {
    /// Creates a router writing default files under `log_dir` and reporting on `bus`.
    pub fn new(log_dir: impl Into<PathBuf>, bus: Bus) -> Self {
        Self {
            log_dir: log_dir.into(),
            bus,
        }
    }

    /// Resolves the destinations of `instance` without opening anything.
    pub fn paths(&self, desc: &ProcessDescriptor, instance: u32) -> LogPaths {
        LogPaths::resolve(desc, instance, &self.log_dir)
    }

    /// Opens the destinations of `instance` for append.
    ///
    /// With `merge_logs` (or when both streams resolve to one file) a single sink
    /// is shared; the stderr path is never opened then.
    pub async fn open(&self, desc: &ProcessDescriptor, instance: u32) -> LogSinks {
        let paths = self.paths(desc, instance);
        let stdout = LogFile::open(&paths.stdout).await.shared();
        let stderr = match &paths.stderr {
            Some(path) if *path != paths.stdout => LogFile::open(path).await.shared(),
            _ => Arc::clone(&stdout),
        };
        LogSinks {
            stdout,
            stderr,
            paths,
        }
    }

    /// Starts one pump per captured stream of `child`.
    pub fn attach(&self, child: &mut Child, sinks: &LogSinks, name: Arc<str>, instance: u32) -> LogPumps {
        let mut handles = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            handles.push(tokio::spawn(pump(
                out,
                Arc::clone(&sinks.stdout),
                self.bus.clone(),
                Arc::clone(&name),
                instance,
            )));
        }
        if let Some(err) = child.stderr.take() {
            handles.push(tokio::spawn(pump(
                err,
                Arc::clone(&sinks.stderr),
                self.bus.clone(),
                name,
                instance,
            )));
        }
        LogPumps { handles }
    }
}

/// Copies `reader` into `sink` chunk by chunk until EOF.
pub async fn pump<R>(mut reader: R, sink: SharedSink, bus: Bus, name: Arc<str>, instance: u32)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK];
    let mut failing = false;
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                tracing::debug!(process = %name, instance, error = %err, "log pipe read failed");
                break;
            }
        };

        let res = sink.lock().await.append(&buf[..n]).await;
        match res {
            Ok(()) => failing = false,
            Err(err) if !failing => {
                failing = true;
                tracing::warn!(process = %name, instance, label = err.as_label(), error = %err, "log write failed");
                bus.publish(
                    Event::new(EventKind::LogWriteFailed)
                        .with_process(Arc::clone(&name), instance)
                        .with_reason(err.to_string()),
                );
            }
            Err(_) => {}
        }
    }
}
