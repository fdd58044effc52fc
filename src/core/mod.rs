//! Runtime core: control loop, state machine and lifecycle.
//!
//! The public API of this module is [`Supervisor`] (construction, launch, run),
//! [`SupervisorHandle`] (operator commands) and the status types.
//!
//! Internal modules:
//! - [`registry`]: the control loop; owns every instance and applies the state machine;
//! - [`actor`]: one waiter task per instance run (spawn, wait/terminate, report);
//! - [`command`]: the control loop queue messages;
//! - [`managed`]: per-instance bookkeeping;
//! - [`shutdown`]: OS termination signals.

mod actor;
mod builder;
mod command;
mod config;
mod handle;
mod managed;
mod registry;
mod shutdown;
mod state;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use command::Target;
pub use config::SupervisorConfig;
pub use handle::SupervisorHandle;
pub use shutdown::wait_for_shutdown_signal;
pub use state::{ProcessState, ProcessStatus};
pub use supervisor::Supervisor;
