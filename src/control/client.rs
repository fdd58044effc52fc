//! Control socket client used by the CLI subcommands.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::core::ProcessStatus;
use crate::error::ControlError;

use super::protocol::{Request, Response};

/// Sends one request to the daemon listening on `path` and waits for the reply.
pub async fn send(path: &Path, request: &Request) -> Result<Vec<ProcessStatus>, ControlError> {
    let io_err = |source: std::io::Error| ControlError::Io {
        path: path.to_path_buf(),
        source,
    };

    let stream = UnixStream::connect(path).await.map_err(io_err)?;
    let (reader, mut writer) = stream.into_split();

    let mut line = serde_json::to_string(request).map_err(|e| ControlError::Protocol {
        reason: e.to_string(),
    })?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await.map_err(io_err)?;

    let mut reply = String::new();
    let n = BufReader::new(reader)
        .read_line(&mut reply)
        .await
        .map_err(io_err)?;
    if n == 0 {
        return Err(ControlError::Protocol {
            reason: "daemon closed the connection".into(),
        });
    }

    let response: Response = serde_json::from_str(reply.trim()).map_err(|e| ControlError::Protocol {
        reason: e.to_string(),
    })?;
    response.into_result()
}
