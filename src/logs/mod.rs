//! Log routing for supervised processes.
//!
//! - [`LogRouter`] opens destinations and pumps child output into them
//! - [`LogPaths`] where an instance's output goes
//! - [`LogFile`] append-only sink with reopen-on-error
//! - [`tail`] last lines of a log file

mod paths;
mod router;
mod sink;
mod tail;

pub use paths::LogPaths;
pub use router::{LogPumps, LogRouter, LogSinks};
pub use sink::{LogFile, SharedSink};
pub use tail::tail;
