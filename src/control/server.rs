//! Control socket server.
//!
//! ```text
//! UnixListener ─► accept ─► task per connection
//!                             └─ line ─► Request ─► SupervisorHandle ─► Response line
//! ```
//!
//! A malformed line gets a `protocol` failure response; the connection stays open.

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use crate::core::SupervisorHandle;
use crate::error::{ControlError, RuntimeError};

use super::protocol::{Request, Response};

/// Bound control socket.
pub struct ControlServer {
    path: PathBuf,
    listener: UnixListener,
}

impl ControlServer {
    /// Binds `path`, replacing a stale socket file left by a previous daemon.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self, RuntimeError> {
        let path = path.into();
        if path.exists() {
            let _ = std::fs::remove_file(&path);
        }
        let listener = UnixListener::bind(&path).map_err(|source| RuntimeError::Socket {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), "control socket listening");
        Ok(Self { path, listener })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serves connections until `token` is cancelled, then removes the socket file.
    pub async fn serve(self, handle: SupervisorHandle, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let handle = handle.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, handle).await {
                                tracing::debug!(error = %err, "control connection closed");
                            }
                        });
                    }
                    Err(err) => tracing::warn!(error = %err, "control accept failed"),
                },
            }
        }
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn handle_connection(stream: UnixStream, handle: SupervisorHandle) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<Request>(line.trim()) {
            Ok(request) => dispatch(request, &handle).await,
            Err(err) => Response::failure(&ControlError::Protocol {
                reason: err.to_string(),
            }),
        };
        let mut out = serde_json::to_string(&response).map_err(io::Error::other)?;
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
        line.clear();
    }
    Ok(())
}

async fn dispatch(request: Request, handle: &SupervisorHandle) -> Response {
    tracing::debug!(?request, "control request");
    let res = match &request {
        Request::Start { target } => handle.start(target).await,
        Request::Stop { target } => handle.stop(target).await,
        Request::Restart { target } => handle.restart(target).await,
        Request::Status { target } => handle.status(target).await,
    };
    res.into()
}
