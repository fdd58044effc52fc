//! Messages of the control loop queue.
//!
//! Everything that mutates the registry goes through one bounded mpsc queue:
//! operator commands (handle, control socket), cron intents, waiter reports and
//! backoff timers. Waiter/timer messages carry the instance `generation` they
//! were issued for; the loop drops messages from superseded generations.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::core::state::ProcessStatus;
use crate::error::{ControlError, SpawnError};
use crate::events::RestartSource;
use crate::process::ExitInfo;

/// Reply channel of operator commands.
pub(crate) type Reply = oneshot::Sender<Result<Vec<ProcessStatus>, ControlError>>;

/// Which descriptors a command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every managed descriptor.
    All,
    /// One descriptor (all of its instances).
    Name(String),
}

impl Target {
    /// `"all"` selects every descriptor; anything else is a name.
    pub fn parse(s: &str) -> Self {
        match s {
            "all" => Target::All,
            name => Target::Name(name.to_string()),
        }
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target::parse(s)
    }
}

/// Identifies one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InstanceKey {
    pub name: Arc<str>,
    pub instance: u32,
}

pub(crate) enum Command {
    // === Operator ===
    Start {
        target: Target,
        reply: Reply,
    },
    Stop {
        target: Target,
        reply: Reply,
    },
    Restart {
        target: Target,
        source: RestartSource,
        reply: Option<Reply>,
    },
    Status {
        target: Target,
        reply: Reply,
    },
    /// Stop everything and refuse new work; replies once nothing is alive.
    Shutdown {
        reply: oneshot::Sender<()>,
    },

    // === Internal ===
    Spawned {
        key: InstanceKey,
        generation: u64,
        pid: Option<u32>,
    },
    SpawnFailed {
        key: InstanceKey,
        generation: u64,
        error: SpawnError,
    },
    Exited {
        key: InstanceKey,
        generation: u64,
        exit: Option<ExitInfo>,
    },
    BackoffElapsed {
        key: InstanceKey,
        generation: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parse() {
        assert_eq!(Target::parse("all"), Target::All);
        assert_eq!(Target::from("dsp"), Target::Name("dsp".into()));
        assert_eq!(Target::parse("All"), Target::Name("All".into()));
    }
}
