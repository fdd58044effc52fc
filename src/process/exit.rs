//! Exit status of a supervised process.

use std::fmt;
use std::process::ExitStatus;

use serde::{Deserialize, Serialize};

use crate::error::ExitError;

/// How a process ended: exit code, terminating signal, or neither if unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExitInfo {
    /// Exit code, for a normal exit.
    pub code: Option<i32>,
    /// Signal number, for a process killed by a signal.
    pub signal: Option<i32>,
}

impl ExitInfo {
    /// Status could not be collected.
    pub const UNKNOWN: ExitInfo = ExitInfo {
        code: None,
        signal: None,
    };

    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn killed(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// The crash description used when this exit was not requested.
    pub fn to_error(&self) -> ExitError {
        match (self.code, self.signal) {
            (Some(code), _) => ExitError::Code { code },
            (None, Some(signal)) => ExitError::Signal { signal },
            (None, None) => ExitError::Unknown {
                reason: "no exit status".into(),
            },
        }
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            Self {
                code: status.code(),
                signal: status.signal(),
            }
        }
        #[cfg(not(unix))]
        {
            Self {
                code: status.code(),
                signal: None,
            }
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown"),
        }
    }
}
