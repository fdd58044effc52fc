//! # OS termination signals.
//!
//! [`wait_for_shutdown_signal`] completes on the first of `SIGINT`, `SIGTERM` or
//! `SIGQUIT` (Ctrl-C only on non-Unix platforms) and names the signal for logs.

/// Waits for a termination signal and returns its name.
///
/// Each call installs independent listeners; `Err` if installation fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Waits for Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
