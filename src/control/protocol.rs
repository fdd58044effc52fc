//! Control socket wire format: one JSON object per line in each direction.
//!
//! ```text
//! → {"type":"restart","target":"dsp"}
//! ← {"success":true,"processes":[{"name":"dsp","instance":0,"state":"stopping",...}]}
//! → {"type":"start","target":"nope"}
//! ← {"success":false,"error":"process \"nope\" not found","code":"not_found"}
//! ```

use serde::{Deserialize, Serialize};

use crate::core::ProcessStatus;
use crate::error::ControlError;

fn all() -> String {
    "all".to_string()
}

/// A lifecycle command; `target` is a descriptor name or `"all"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Start { target: String },
    Stop { target: String },
    Restart { target: String },
    Status {
        #[serde(default = "all")]
        target: String,
    },
}

/// Reply to one [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable error label ([`ControlError::as_label`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processes: Vec<ProcessStatus>,
}

impl Response {
    pub fn ok(processes: Vec<ProcessStatus>) -> Self {
        Self {
            success: true,
            error: None,
            code: None,
            processes,
        }
    }

    pub fn failure(err: &ControlError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            code: Some(err.as_label().to_string()),
            processes: Vec::new(),
        }
    }

    /// Converts back into the result the daemon produced.
    pub fn into_result(self) -> Result<Vec<ProcessStatus>, ControlError> {
        if self.success {
            return Ok(self.processes);
        }
        Err(ControlError::Remote {
            label: self.code.unwrap_or_else(|| "remote".to_string()),
            message: self.error.unwrap_or_else(|| "request failed".to_string()),
        })
    }
}

impl From<Result<Vec<ProcessStatus>, ControlError>> for Response {
    fn from(res: Result<Vec<ProcessStatus>, ControlError>) -> Self {
        match res {
            Ok(processes) => Response::ok(processes),
            Err(err) => Response::failure(&err),
        }
    }
}
