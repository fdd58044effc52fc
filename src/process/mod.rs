//! OS process spawning and termination.
//!
//! - [`ProcessRunner`] spawns one instance with output routed to the log files
//! - [`RunningProcess`] live handle: `wait`, `terminate`, `drain`
//! - [`ExitInfo`] exit code / signal

mod exit;
mod runner;

pub use exit::ExitInfo;
pub use runner::{ProcessRunner, RunningProcess};
