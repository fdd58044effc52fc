//! `procvisor` command-line entry point.
//!
//! ```text
//! procvisor daemon                 run the supervisor in the foreground
//! procvisor start|stop|restart X   talk to the daemon over the control socket
//! procvisor status [X]             (X = descriptor name or "all")
//! procvisor logs X [-n N]          tail the log files of X (or all)
//! ```
//!
//! Exit codes: `0` success, `2` unknown descriptor, `1` anything else.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use procvisor::control::{self, ControlServer, Request};
use procvisor::{
    ControlError, DescriptorStore, LogPaths, LogWriter, ProcessStatus, Subscribe, Supervisor,
    SupervisorConfig, wait_for_shutdown_signal,
};

#[derive(Parser)]
#[command(name = "procvisor")]
#[command(about = "Supervise long-running processes: crash restarts, cron restarts, log routing")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, global = true, env = "PROCVISOR_CONFIG", default_value = "procvisor.toml")]
    config: PathBuf,

    /// Control socket path (overrides [supervisor].socket)
    #[arg(short, long, global = true, env = "PROCVISOR_SOCKET")]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the supervisor in the foreground until SIGINT/SIGTERM
    Daemon,

    /// Start a process (or "all")
    Start { target: String },

    /// Stop a process (or "all")
    Stop { target: String },

    /// Restart a process (or "all")
    Restart { target: String },

    /// Show process status
    Status {
        #[arg(default_value = "all")]
        target: String,
    },

    /// Print the last lines of a process's log files (or "all")
    Logs {
        target: String,

        /// Number of lines per file
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
    },
}

/// Logging to stderr. Default: INFO, `RUST_LOG` override.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<ControlError>()
                .map(ControlError::exit_code)
                .unwrap_or(1);
            eprintln!("error: {err:#}");
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Daemon => daemon(&cli.config, cli.socket).await,
        Commands::Start { ref target } => {
            remote(&cli, Request::Start { target: target.clone() }).await
        }
        Commands::Stop { ref target } => {
            remote(&cli, Request::Stop { target: target.clone() }).await
        }
        Commands::Restart { ref target } => {
            remote(&cli, Request::Restart { target: target.clone() }).await
        }
        Commands::Status { ref target } => {
            remote(&cli, Request::Status { target: target.clone() }).await
        }
        Commands::Logs { ref target, lines } => logs(&cli.config, target, lines),
    }
}

async fn daemon(config: &Path, socket: Option<PathBuf>) -> Result<()> {
    let report = DescriptorStore::load_path(config)
        .with_context(|| format!("loading {}", config.display()))?;
    if !report.rejected.is_empty() {
        tracing::warn!(rejected = report.rejected.len(), "some descriptors were rejected");
    }
    let socket = socket.unwrap_or_else(|| report.supervisor.socket.clone());

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(report.supervisor)
        .with_subscribers(subs)
        .build();

    let server = ControlServer::bind(&socket)?;
    let handle = sup.launch(report.descriptors)?;
    let token = CancellationToken::new();
    let server_task = tokio::spawn(server.serve(handle.clone(), token.clone()));

    handle.start_all().await?;

    let signal = wait_for_shutdown_signal()
        .await
        .context("installing signal handlers")?;
    tracing::info!(signal, "termination signal received, shutting down");

    token.cancel();
    let res = handle.shutdown().await;
    let _ = server_task.await;
    res?;
    Ok(())
}

/// Socket from `--socket`, else the config's `[supervisor].socket`, else the default.
fn socket_path(cli: &Cli) -> PathBuf {
    if let Some(socket) = &cli.socket {
        return socket.clone();
    }
    match DescriptorStore::load_path(&cli.config) {
        Ok(report) => report.supervisor.socket,
        Err(_) => SupervisorConfig::default().socket,
    }
}

async fn remote(cli: &Cli, request: Request) -> Result<()> {
    let socket = socket_path(cli);
    let processes = control::send(&socket, &request).await?;
    print_table(&processes);
    Ok(())
}

fn print_table(processes: &[ProcessStatus]) {
    println!(
        "{:<16} {:>4} {:<9} {:>8} {:>8} {:>7}  {}",
        "NAME", "INST", "STATE", "PID", "RESTARTS", "CRASHES", "LAST EXIT"
    );
    for p in processes {
        let pid = p.pid.map(|pid| pid.to_string()).unwrap_or_else(|| "-".into());
        let last = p
            .last_exit
            .map(|e| e.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<16} {:>4} {:<9} {:>8} {:>8} {:>7}  {}",
            p.name, p.instance, p.state, pid, p.restarts, p.crashes, last
        );
    }
}

fn logs(config: &Path, target: &str, lines: usize) -> Result<()> {
    let report = DescriptorStore::load_path(config)
        .with_context(|| format!("loading {}", config.display()))?;
    let mut shown = HashSet::new();
    for desc in report.select(target)? {
        for instance in 0..desc.instances() {
            let paths = LogPaths::resolve(desc, instance, &report.supervisor.log_dir);
            // Several processes may share one merged file.
            for path in paths.all().filter(|p| shown.insert(p.to_path_buf())) {
                println!("==> {} <==", path.display());
                match procvisor::tail(path, lines) {
                    Ok(tail) => tail.iter().for_each(|line| println!("{line}")),
                    Err(err) => println!("({err})"),
                }
            }
        }
    }
    Ok(())
}
