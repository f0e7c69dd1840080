//! `tasksync`: command-line front end for the offline task store.
//!
//! Every run loads persisted state, probes the server once, drains any
//! pending actions if it is reachable, and then applies one command.
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/tasksync/config.toml`).
//!
//! ```bash
//! # Works offline; the action is queued until the server is reachable
//! cargo run --bin tasksync -- add "Buy milk" --priority high
//!
//! # Point at a server and replay the queue
//! TASKSYNC_URL=http://127.0.0.1:8080 cargo run --bin tasksync -- sync
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use tasksync::cli::{self, CliError};
use tasksync::config::{CliArgs, ClientConfig};
use tasksync::connectivity::{ConnectivityMonitor, HealthProbe};
use tasksync::remote::HttpTaskService;
use tasksync::storage::FileStore;
use tasksync::store::{StoreEvent, TaskStore};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Logs go to a file so stdout carries only command output.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!(base_url = %config.base_url, "tasksync starting");

    match run(&config, cli.command.unwrap_or_default()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Errors that abort a run before or during the command.
#[derive(Debug, thiserror::Error)]
enum RunError {
    /// No data directory configured and none available on this platform.
    #[error("no data directory available; pass --data-dir")]
    NoDataDir,

    /// Opening the data directory failed.
    #[error(transparent)]
    Storage(#[from] tasksync::storage::StorageError),

    /// Building the HTTP client failed.
    #[error(transparent)]
    Remote(#[from] tasksync::remote::RemoteError),

    /// The command itself failed.
    #[error(transparent)]
    Command(#[from] CliError),
}

async fn run(config: &ClientConfig, command: cli::Command) -> Result<(), RunError> {
    let dir = config.storage_dir().ok_or(RunError::NoDataDir)?;
    let storage = FileStore::open(dir).await?;
    let remote = HttpTaskService::new(
        config.base_url.clone(),
        config.request_timeout,
        config.retry.clone(),
    )?;

    let monitor = ConnectivityMonitor::new(false);
    let online = HealthProbe::new(remote.clone(), monitor, config.health_interval)
        .probe_once()
        .await;
    tracing::info!(online, "initial connectivity");

    let (store, events) = TaskStore::new(storage, remote, config.event_buffer);
    let event_logger = tokio::spawn(log_events(events));

    store.set_online_status(online).await;
    store.load_from_storage().await;

    let mut stdout = std::io::stdout().lock();
    let result = cli::execute(&store, command, &mut stdout).await;

    drop(store);
    let _ = event_logger.await;
    tracing::info!("tasksync exiting");
    result.map_err(RunError::from)
}

/// Forward store events to the log until the store is dropped.
async fn log_events(mut events: mpsc::Receiver<StoreEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            StoreEvent::SyncFailed { error } => tracing::warn!(%error, "sync failed"),
            StoreEvent::StorageFailed { reason } => tracing::warn!(%reason, "storage failed"),
            other => tracing::debug!(event = ?other, "store event"),
        }
    }
}

/// Initialize file-based logging.
///
/// Logs are written to a file (never stdout, which carries command output).
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("tasksync.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
