//! Error types used by the procvisor runtime.
//!
//! The taxonomy follows how far an error is allowed to travel:
//!
//! - [`ConfigError`]: a malformed descriptor or document; rejected at load time.
//! - [`SpawnError`]: an executable/path problem; fed into the restart policy.
//! - [`ExitError`]: a supervised process exited without being asked to.
//! - [`LogIoError`]: a log destination failed; reported, never fatal.
//! - [`ControlError`]: a lifecycle command could not be applied (CLI-facing).
//! - [`RuntimeError`]: the supervisor itself could not run or shut down cleanly.
//!
//! Every enum exposes `as_label()`, a short stable snake_case label for logs.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced while loading process descriptors.
///
/// `Read` and `Parse` abort the whole load; the remaining variants reject a
/// single descriptor and leave the others intact.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The document is not valid TOML/JSON or has the wrong shape.
    #[error("failed to parse configuration: {reason}")]
    Parse { reason: String },

    /// Descriptor at `index` has no (or an empty) name.
    #[error("descriptor #{index} has no name")]
    MissingName { index: usize },

    /// Descriptor has no command/script.
    #[error("process {name:?}: missing command")]
    MissingCommand { name: String },

    /// Instance count is outside `1..=MAX_INSTANCES`.
    #[error("process {name:?}: instances must be between 1 and {}, got {instances}", crate::descriptor::MAX_INSTANCES)]
    InvalidInstances { name: String, instances: i64 },

    /// The cron restart expression could not be parsed.
    #[error("process {name:?}: invalid cron_restart {expr:?}: {reason}")]
    InvalidSchedule {
        name: String,
        expr: String,
        reason: String,
    },

    /// A duration string (`"10s"`, `"500ms"`) could not be parsed.
    #[error("{field}: invalid duration {value:?}")]
    InvalidDuration { field: String, value: String },

    /// Another descriptor already uses this name.
    #[error("process {name:?}: duplicate name")]
    DuplicateName { name: String },

    /// The name is a reserved target (`"all"`).
    #[error("process {name:?}: name is reserved")]
    ReservedName { name: String },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use procvisor::ConfigError;
    ///
    /// let err = ConfigError::DuplicateName { name: "dsp".into() };
    /// assert_eq!(err.as_label(), "config_duplicate_name");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse { .. } => "config_parse",
            ConfigError::MissingName { .. } => "config_missing_name",
            ConfigError::MissingCommand { .. } => "config_missing_command",
            ConfigError::InvalidInstances { .. } => "config_invalid_instances",
            ConfigError::InvalidSchedule { .. } => "config_invalid_schedule",
            ConfigError::InvalidDuration { .. } => "config_invalid_duration",
            ConfigError::DuplicateName { .. } => "config_duplicate_name",
            ConfigError::ReservedName { .. } => "config_reserved_name",
        }
    }

    /// True when the whole document is unusable (not just one descriptor).
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConfigError::Read { .. } | ConfigError::Parse { .. })
    }
}

/// # Errors produced when an OS process cannot be spawned.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The executable does not exist (or is not on `PATH`).
    #[error("executable not found: {command}")]
    ExecutableNotFound { command: PathBuf },

    /// The executable exists but may not be executed.
    #[error("permission denied: {command}")]
    PermissionDenied { command: PathBuf },

    /// The configured working directory does not exist.
    #[error("working directory missing: {cwd}")]
    WorkingDirMissing { cwd: PathBuf },

    /// Any other spawn failure reported by the OS.
    #[error("failed to spawn {command}: {source}")]
    Io {
        command: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SpawnError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::ExecutableNotFound { .. } => "spawn_not_found",
            SpawnError::PermissionDenied { .. } => "spawn_permission_denied",
            SpawnError::WorkingDirMissing { .. } => "spawn_cwd_missing",
            SpawnError::Io { .. } => "spawn_io",
        }
    }

    /// Classifies an `io::Error` returned by `Command::spawn`.
    pub(crate) fn from_io(command: PathBuf, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SpawnError::ExecutableNotFound { command },
            io::ErrorKind::PermissionDenied => SpawnError::PermissionDenied { command },
            _ => SpawnError::Io {
                command,
                source: err,
            },
        }
    }
}

/// # Unexpected termination of a supervised process.
///
/// Produced for every exit that was not requested by a stop; a clean `0`
/// exit still counts, since supervised processes are expected to run forever.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExitError {
    /// Exited on its own with a status code.
    #[error("exited with code {code}")]
    Code { code: i32 },

    /// Terminated by a signal nobody in the supervisor sent.
    #[error("killed by signal {signal}")]
    Signal { signal: i32 },

    /// Exit status could not be collected.
    #[error("exit status unavailable: {reason}")]
    Unknown { reason: String },
}

impl ExitError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExitError::Code { .. } => "exit_code",
            ExitError::Signal { .. } => "exit_signal",
            ExitError::Unknown { .. } => "exit_unknown",
        }
    }
}

/// # Failure writing or (re)opening a log destination.
#[derive(Error, Debug)]
#[error("log {op} failed for {path}: {source}")]
pub struct LogIoError {
    /// Destination file.
    pub path: PathBuf,
    /// Operation that failed (`open`, `write`).
    pub op: &'static str,
    /// Underlying error.
    #[source]
    pub source: io::Error,
}

impl LogIoError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        "log_io"
    }
}

/// # Errors returned by lifecycle commands (start/stop/restart/status).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ControlError {
    /// No descriptor with this name is managed.
    #[error("process {name:?} not found")]
    NotFound { name: String },

    /// The supervisor is shutting down and refuses new work.
    #[error("supervisor is shutting down")]
    ShuttingDown,

    /// The supervisor's command queue is gone.
    #[error("supervisor unavailable")]
    Closed,

    /// The control socket could not be reached or spoke garbage.
    #[error("control socket {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed request/response on the control socket.
    #[error("control protocol error: {reason}")]
    Protocol { reason: String },

    /// The daemon reported a failure.
    #[error("{message}")]
    Remote { label: String, message: String },
}

impl ControlError {
    /// Returns a short stable label (snake_case) for use in logs and on the wire.
    pub fn as_label(&self) -> &str {
        match self {
            ControlError::NotFound { .. } => "not_found",
            ControlError::ShuttingDown => "shutting_down",
            ControlError::Closed => "closed",
            ControlError::Io { .. } => "io",
            ControlError::Protocol { .. } => "protocol",
            ControlError::Remote { label, .. } => label,
        }
    }

    /// Process exit code for the CLI: `2` for unknown names, `1` otherwise.
    pub fn exit_code(&self) -> u8 {
        match self.as_label() {
            "not_found" => 2,
            _ => 1,
        }
    }
}

/// # Errors produced by the supervisor runtime itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some processes were still alive.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// `name#instance` of every process that did not stop in time.
        stuck: Vec<String>,
    },

    /// OS signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),

    /// The control socket could not be bound.
    #[error("failed to bind control socket {path}: {source}")]
    Socket {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration could not be used to start the supervisor.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use procvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signals(_) => "runtime_signals",
            RuntimeError::Socket { .. } => "runtime_socket",
            RuntimeError::Config(_) => "runtime_config",
        }
    }
}
