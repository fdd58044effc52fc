//! Append-only log file with reopen-on-error.
//!
//! ```text
//! append(chunk)
//!   ├─ file closed? ─► reopen ── fail ─► LogIoError{op: "open"}
//!   ├─ write ok     ─► Ok
//!   └─ write fail   ─► drop handle, reopen, retry once ── fail ─► LogIoError{op: "write"}
//! ```
//!
//! Opening never fails hard: a destination that cannot be opened stays detached
//! and every later chunk retries the open, so log rotation (file moved away) and
//! transient errors heal by themselves.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::LogIoError;

/// A sink shared by the pumps writing to one file (both pumps when merged).
pub type SharedSink = Arc<Mutex<LogFile>>;

/// One append-only destination.
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    file: Option<File>,
}

impl LogFile {
    /// Opens `path` for append, creating it and its parent directories.
    ///
    /// On failure the sink is returned detached (see module docs).
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let mut sink = Self {
            path: path.into(),
            file: None,
        };
        if let Err(err) = sink.reopen().await {
            tracing::warn!(path = %sink.path.display(), error = %err, "log open failed");
        }
        sink
    }

    /// Wraps the sink for sharing between pumps.
    pub fn shared(self) -> SharedSink {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True while a file handle is held.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Appends `chunk` as one write.
    pub async fn append(&mut self, chunk: &[u8]) -> Result<(), LogIoError> {
        if self.file.is_none() {
            self.reopen().await.map_err(|source| self.error("open", source))?;
        }
        if self.write(chunk).await.is_ok() {
            return Ok(());
        }

        self.file = None;
        self.reopen().await.map_err(|source| self.error("open", source))?;
        if let Err(source) = self.write(chunk).await {
            self.file = None;
            return Err(self.error("write", source));
        }
        Ok(())
    }

    async fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => {
                file.write_all(chunk).await?;
                file.flush().await
            }
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "log file not open")),
        }
    }

    async fn reopen(&mut self) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        self.file = Some(file);
        Ok(())
    }

    fn error(&self, op: &'static str, source: io::Error) -> LogIoError {
        LogIoError {
            path: self.path.clone(),
            op,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_appends_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/out.log");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"old\n").unwrap();

        let mut sink = LogFile::open(&path).await;
        sink.append(b"new\n").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"old\nnew\n");

        let fresh = dir.path().join("a/b/c.log");
        let mut sink = LogFile::open(&fresh).await;
        assert!(sink.is_open());
        sink.append(b"x").await.unwrap();
        assert_eq!(std::fs::read(&fresh).unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_detached_sink_heals_on_next_write() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("logs");
        std::fs::write(&parent, b"").unwrap();

        let path = parent.join("trace.log");
        let mut sink = LogFile::open(&path).await;
        assert!(sink.append(b"lost\n").await.is_err());

        std::fs::remove_file(&parent).unwrap();
        sink.append(b"kept\n").await.unwrap();
        assert!(sink.is_open());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "kept\n");
    }

    #[tokio::test]
    async fn test_unopenable_path_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();

        let mut sink = LogFile::open(blocker.join("out.log")).await;
        assert!(!sink.is_open());
        let err = sink.append(b"lost").await.unwrap_err();
        assert_eq!(err.op, "open");
        assert_eq!(err.as_label(), "log_io");
    }
}
