#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use procvisor::{
    BackoffPolicy, Event, EventKind, JitterPolicy, ProcessState, ProcessStatus, RestartLimit,
    SupervisorConfig, SupervisorHandle,
};
use tokio::sync::broadcast;

/// Fast config rooted in `dir`: short backoff, short grace.
pub fn config(dir: &Path) -> SupervisorConfig {
    SupervisorConfig {
        grace: Duration::from_secs(5),
        kill_timeout: Duration::from_secs(2),
        backoff: BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_millis(50),
            factor: 2.0,
            jitter: JitterPolicy::None,
        },
        limit: RestartLimit {
            max_restarts: 10,
            window: Duration::from_secs(60),
        },
        min_uptime: Duration::from_secs(10),
        log_dir: dir.join("logs"),
        drain_timeout: Duration::from_millis(500),
        tick: Duration::from_millis(10),
        socket: dir.join("procvisor.sock"),
        ..SupervisorConfig::default()
    }
}

/// Polls `status(name)` until `pred` holds; panics after 10s.
pub async fn wait_until<F>(handle: &SupervisorHandle, name: &str, pred: F) -> Vec<ProcessStatus>
where
    F: Fn(&[ProcessStatus]) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let status = handle.status(name).await.expect("status");
        if pred(&status) {
            return status;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached for {name}: {status:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Waits for the next event of `kind` concerning `name`; panics after 10s.
pub async fn next_event(rx: &mut broadcast::Receiver<Event>, kind: EventKind, name: &str) -> Event {
    let fut = async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.kind == kind && ev.is_for(name) => return ev,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .unwrap_or_else(|_| panic!("no {kind:?} event for {name}"))
}

pub fn all_running(status: &[ProcessStatus]) -> bool {
    !status.is_empty() && status.iter().all(|s| s.state == ProcessState::Running && s.pid.is_some())
}
