//! `tasksync-server`: in-memory reference server for the `TaskSync` client.
//!
//! ```bash
//! # Run on default address 127.0.0.1:8080
//! cargo run --bin tasksync-server
//!
//! # Run on a custom address
//! TASKSYNC_ADDR=0.0.0.0:3000 cargo run --bin tasksync-server
//! ```

use std::sync::Arc;

use clap::Parser;
use tasksync_server::config::{ServerCliArgs, ServerConfig};
use tasksync_server::server;
use tasksync_server::store::TaskRepository;

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting tasksync server");

    let repo = Arc::new(TaskRepository::with_max_title_len(config.max_title_len));

    match server::start_server_with_state(&config.bind_addr, repo).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "task server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "task server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start task server");
            std::process::exit(1);
        }
    }
}
