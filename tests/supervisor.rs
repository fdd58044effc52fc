mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeDelta};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use procvisor::{
    ControlError, CronExpr, EventKind, ManualClock, ProcessDescriptor, ProcessState, RestartSource,
    RuntimeError, Supervisor,
};

use common::{all_running, config, next_event, wait_until};

fn sleeper(name: &str) -> ProcessDescriptor {
    ProcessDescriptor::new(name, "/bin/sh").with_args(["-c", "exec sleep 30"])
}

#[tokio::test]
async fn test_instances_get_distinct_pids() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    let handle = sup.launch(vec![sleeper("worker").with_instances(3)]).unwrap();

    handle.start_all().await.unwrap();
    let status = wait_until(&handle, "worker", all_running).await;

    assert_eq!(status.len(), 3);
    assert_eq!(
        status.iter().map(|s| s.instance).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    let pids: HashSet<u32> = status.iter().filter_map(|s| s.pid).collect();
    assert_eq!(pids.len(), 3);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    let handle = sup.launch(vec![sleeper("snap")]).unwrap();

    handle.start("snap").await.unwrap();
    let first = wait_until(&handle, "snap", all_running).await;

    let again = handle.start("snap").await.unwrap();
    assert_eq!(again[0].state, ProcessState::Running);
    assert_eq!(again[0].pid, first[0].pid);
    assert_eq!(again[0].restarts, 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_name_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    let handle = sup.launch(vec![sleeper("snap")]).unwrap();

    let err = handle.restart("nope").await.unwrap_err();
    assert!(matches!(err, ControlError::NotFound { ref name } if name == "nope"));
    assert_eq!(err.exit_code(), 2);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_names_rejected_at_launch() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    assert!(sup.launch(vec![sleeper("a"), sleeper("a")]).is_err());
}

#[tokio::test]
async fn test_reserved_name_rejected_at_launch() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    let err = sup.launch(vec![sleeper("all")]).err().unwrap();
    assert_eq!(err.as_label(), "config_reserved_name");
}

#[tokio::test]
async fn test_stop_sends_sigterm() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    let handle = sup.launch(vec![sleeper("snap")]).unwrap();

    handle.start_all().await.unwrap();
    wait_until(&handle, "snap", all_running).await;

    handle.stop("snap").await.unwrap();
    let status = wait_until(&handle, "snap", |s| s[0].state == ProcessState::Stopped).await;
    assert_eq!(status[0].pid, None);
    assert_eq!(status[0].crashes, 0);
    assert_eq!(status[0].last_exit.and_then(|e| e.signal), Some(15));

    // Stopping a stopped process is a no-op.
    let again = handle.stop("snap").await.unwrap();
    assert_eq!(again[0].state, ProcessState::Stopped);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_killed_process_is_restarted() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    let handle = sup.launch(vec![sleeper("dsp")]).unwrap();
    let mut rx = handle.subscribe();

    handle.start_all().await.unwrap();
    let before = wait_until(&handle, "dsp", all_running).await;
    let old_pid = before[0].pid.unwrap();

    kill(Pid::from_raw(old_pid as i32), Signal::SIGKILL).unwrap();

    let crashed = next_event(&mut rx, EventKind::ProcessCrashed, "dsp").await;
    assert_eq!(crashed.signal, Some(9));

    let after = wait_until(&handle, "dsp", |s| {
        all_running(s) && s[0].pid != Some(old_pid)
    })
    .await;
    assert_eq!(after[0].restarts, 1);
    assert_eq!(after[0].crashes, 1);
    assert_eq!(after[0].last_exit.and_then(|e| e.signal), Some(9));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_restart_storm_ends_failed() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    let storm = ProcessDescriptor::new("storm", "/bin/sh")
        .with_args(["-c", "exit 1"])
        .with_max_restarts(3);
    let handle = sup.launch(vec![storm]).unwrap();
    let mut rx = handle.subscribe();

    handle.start_all().await.unwrap();
    let failed = next_event(&mut rx, EventKind::ProcessFailed, "storm").await;
    assert!(failed.reason.is_some());

    let status = wait_until(&handle, "storm", |s| s[0].state == ProcessState::Failed).await;
    assert_eq!(status[0].restarts, 3);
    assert_eq!(status[0].crashes, 4);
    assert_eq!(status[0].last_exit.and_then(|e| e.code), Some(1));

    // An explicit start resets the budget and tries again.
    let restarted = handle.start("storm").await.unwrap();
    assert_eq!(restarted[0].state, ProcessState::Starting);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_spawn_failure_counts_as_crash() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    let missing = ProcessDescriptor::new("ghost", "/nonexistent/procvisor-test-binary")
        .with_max_restarts(0);
    let handle = sup.launch(vec![missing]).unwrap();
    let mut rx = handle.subscribe();

    handle.start_all().await.unwrap();
    let ev = next_event(&mut rx, EventKind::SpawnFailed, "ghost").await;
    assert!(ev.reason.is_some());

    let status = wait_until(&handle, "ghost", |s| s[0].state == ProcessState::Failed).await;
    assert_eq!(status[0].crashes, 1);
    assert_eq!(status[0].restarts, 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_merged_logs_keep_write_order() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("trace.log");
    let sup = Supervisor::builder(config(dir.path())).build();
    let chatty = ProcessDescriptor::new("chatty", "/bin/sh")
        .with_args([
            "-c",
            "echo out1; sleep 0.2; echo err1 1>&2; sleep 0.2; echo out2",
        ])
        .with_out_file(&trace)
        .with_merge_logs(true)
        .with_max_restarts(0);
    let handle = sup.launch(vec![chatty]).unwrap();

    handle.start_all().await.unwrap();
    wait_until(&handle, "chatty", |s| s[0].state == ProcessState::Failed).await;

    let content = std::fs::read_to_string(&trace).unwrap();
    assert_eq!(content, "out1\nerr1\nout2\n");
    assert!(!dir.path().join("logs").join("chatty-error.log").exists());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_logs_append_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    let once = ProcessDescriptor::new("once", "/bin/sh")
        .with_args(["-c", "echo hello; echo oops 1>&2; exit 3"])
        .with_max_restarts(1);
    let handle = sup.launch(vec![once]).unwrap();

    handle.start_all().await.unwrap();
    wait_until(&handle, "once", |s| s[0].state == ProcessState::Failed).await;

    let logs = dir.path().join("logs");
    let out = std::fs::read_to_string(logs.join("once-out.log")).unwrap();
    let err = std::fs::read_to_string(logs.join("once-error.log")).unwrap();
    assert_eq!(out, "hello\nhello\n");
    assert_eq!(err, "oops\noops\n");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_operator_restart_replaces_process() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    let handle = sup.launch(vec![sleeper("snap")]).unwrap();
    let mut rx = handle.subscribe();

    handle.start_all().await.unwrap();
    let before = wait_until(&handle, "snap", all_running).await;

    handle.restart("snap").await.unwrap();
    let ev = next_event(&mut rx, EventKind::RestartRequested, "snap").await;
    assert_eq!(ev.source, Some(RestartSource::Operator));

    let after = wait_until(&handle, "snap", |s| {
        all_running(s) && s[0].pid != before[0].pid
    })
    .await;
    assert_eq!(after[0].restarts, 1);
    assert_eq!(after[0].crashes, 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cron_restart_with_manual_clock() {
    let dir = tempfile::tempdir().unwrap();
    let t0 = NaiveDate::from_ymd_opt(2026, 3, 1)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    let clock = Arc::new(ManualClock::new(t0));
    let sup = Supervisor::builder(config(dir.path()))
        .with_clock(clock.clone())
        .build();
    let dsp = sleeper("dsp").with_cron(CronExpr::parse("0 * * * *").unwrap());
    let handle = sup.launch(vec![dsp]).unwrap();
    let mut rx = handle.subscribe();

    handle.start_all().await.unwrap();
    let before = wait_until(&handle, "dsp", all_running).await;

    // Nothing due yet.
    clock.advance(TimeDelta::minutes(20));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.status("dsp").await.unwrap()[0].restarts, 0);

    clock.advance(TimeDelta::minutes(10));
    next_event(&mut rx, EventKind::CronFired, "dsp").await;
    let ev = next_event(&mut rx, EventKind::RestartRequested, "dsp").await;
    assert_eq!(ev.source, Some(RestartSource::Schedule));

    let after = wait_until(&handle, "dsp", |s| {
        all_running(s) && s[0].pid != before[0].pid
    })
    .await;
    assert_eq!(after[0].restarts, 1);
    assert_eq!(after[0].crashes, 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_everything_and_refuses_starts() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    let handle = sup
        .launch(vec![sleeper("dsp"), sleeper("snap").with_instances(2)])
        .unwrap();
    let mut rx = handle.subscribe();

    handle.start_all().await.unwrap();
    wait_until(&handle, "all", all_running).await;

    handle.shutdown().await.unwrap();
    let _ = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Ok(ev) = rx.recv().await {
                if ev.kind == EventKind::AllStoppedWithin {
                    break;
                }
            }
        }
    })
    .await
    .expect("AllStoppedWithin");

    let status = handle.list().await.unwrap();
    assert_eq!(status.len(), 3);
    assert!(status.iter().all(|s| s.state == ProcessState::Stopped));

    let err = handle.start("dsp").await.unwrap_err();
    assert!(matches!(err, ControlError::ShuttingDown));
}

#[tokio::test]
async fn test_shutdown_reports_stuck_processes() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.grace = Duration::from_millis(300);
    cfg.kill_timeout = Duration::from_secs(5);
    let sup = Supervisor::builder(cfg).build();
    let stubborn = ProcessDescriptor::new("stubborn", "/bin/sh")
        .with_args(["-c", "trap '' TERM; while true; do sleep 0.05; done"]);
    let handle = sup.launch(vec![stubborn]).unwrap();

    handle.start_all().await.unwrap();
    wait_until(&handle, "stubborn", all_running).await;
    // Give the shell time to install its trap.
    tokio::time::sleep(Duration::from_millis(200)).await;

    match handle.shutdown().await {
        Err(RuntimeError::GraceExceeded { stuck, .. }) => {
            assert_eq!(stuck, vec!["stubborn#0".to_string()]);
        }
        other => panic!("expected GraceExceeded, got {other:?}"),
    }
}

fn drain_count(rx: &mut tokio::sync::broadcast::Receiver<procvisor::Event>, kind: EventKind, name: &str) -> usize {
    let mut n = 0;
    while let Ok(ev) = rx.try_recv() {
        if ev.kind == kind && ev.is_for(name) {
            n += 1;
        }
    }
    n
}

#[tokio::test]
async fn test_concurrent_restarts_coalesce() {
    let dir = tempfile::tempdir().unwrap();
    let sup = Supervisor::builder(config(dir.path())).build();
    let handle = sup.launch(vec![sleeper("snap")]).unwrap();

    handle.start_all().await.unwrap();
    let before = wait_until(&handle, "snap", all_running).await;
    let mut rx = handle.subscribe();

    let (a, b) = tokio::join!(handle.restart("snap"), handle.restart("snap"));
    a.unwrap();
    b.unwrap();

    let after = wait_until(&handle, "snap", |s| {
        all_running(s) && s[0].pid != before[0].pid
    })
    .await;
    assert_eq!(after[0].restarts, 1);
    assert_eq!(after[0].crashes, 0);

    let mut requested = 0;
    let mut coalesced = 0;
    while let Ok(ev) = rx.try_recv() {
        match ev.kind {
            EventKind::RestartRequested if ev.is_for("snap") => requested += 1,
            EventKind::RestartCoalesced if ev.is_for("snap") => coalesced += 1,
            _ => {}
        }
    }
    assert_eq!(requested, 1);
    assert_eq!(coalesced, 1);

    // Still exactly one instance with one pid after settling.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let settled = handle.status("snap").await.unwrap();
    assert_eq!(settled[0].pid, after[0].pid);
    assert_eq!(settled[0].restarts, 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cron_during_crash_backoff_is_coalesced() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.backoff.first = Duration::from_secs(30);
    cfg.backoff.max = Duration::from_secs(30);

    let t0 = NaiveDate::from_ymd_opt(2026, 3, 1)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    let clock = Arc::new(ManualClock::new(t0));
    let sup = Supervisor::builder(cfg).with_clock(clock.clone()).build();
    let flaky = ProcessDescriptor::new("flaky", "/bin/sh")
        .with_args(["-c", "exit 1"])
        .with_cron(CronExpr::parse("0 * * * *").unwrap());
    let handle = sup.launch(vec![flaky]).unwrap();
    let mut rx = handle.subscribe();

    handle.start_all().await.unwrap();
    // First crash restarts at once, the second waits out the 30s backoff.
    let crashed = wait_until(&handle, "flaky", |s| {
        s[0].state == ProcessState::Crashed && s[0].crashes == 2
    })
    .await;
    assert_eq!(crashed[0].restarts, 1);
    next_event(&mut rx, EventKind::BackoffScheduled, "flaky").await;

    clock.advance(TimeDelta::minutes(30));
    next_event(&mut rx, EventKind::CronFired, "flaky").await;
    let ev = next_event(&mut rx, EventKind::RestartCoalesced, "flaky").await;
    assert_eq!(ev.source, Some(RestartSource::Schedule));

    let status = handle.status("flaky").await.unwrap();
    assert_eq!(status[0].state, ProcessState::Crashed);
    assert_eq!(status[0].restarts, 1);
    assert_eq!(drain_count(&mut rx, EventKind::ProcessStarting, "flaky"), 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_while_starting_leaves_nothing_running() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("child.pid");
    let sup = Supervisor::builder(config(dir.path())).build();
    let desc = ProcessDescriptor::new("eager", "/bin/sh").with_args([
        "-c".to_string(),
        format!("echo $$ > {}; exec sleep 30", pid_file.display()),
    ]);
    let handle = sup.launch(vec![desc]).unwrap();

    let started = handle.start("eager").await.unwrap();
    assert_eq!(started[0].state, ProcessState::Starting);
    let stopping = handle.stop("eager").await.unwrap();
    assert_eq!(stopping[0].state, ProcessState::Stopping);

    let stopped = wait_until(&handle, "eager", |s| s[0].state == ProcessState::Stopped).await;
    assert_eq!(stopped[0].pid, None);

    // No restart follows the cancelled start.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let later = handle.status("eager").await.unwrap();
    assert_eq!(later[0].state, ProcessState::Stopped);
    assert_eq!(later[0].restarts, 0);
    assert_eq!(later[0].crashes, 0);

    // If the child got as far as writing its pid, it must be gone (and reaped).
    if let Some(pid) = std::fs::read_to_string(&pid_file)
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
    {
        assert!(kill(Pid::from_raw(pid), None).is_err(), "child {pid} still alive");
    }

    handle.shutdown().await.unwrap();
}
