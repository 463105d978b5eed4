// SPDX-License-Identifier: MIT

//! `tfsm` — thin binary wrapper around the runtime crates: loads a TOML
//! config, wires a [`RuntimeContext`] over a minimal demo machine
//! definition, and blocks until interrupted.

mod config;
mod exit_error;
mod ping;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tfsm_core::{Event, MachineId, SystemClock};
use tfsm_engine::RuntimeConfig;
use tfsm_engine::RuntimeContext;
use tfsm_persistence::JsonlAdapter;

#[derive(Parser)]
#[command(name = "tfsm", version, about = "State-machine runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a config and run the runtime until interrupted.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
        /// Directory the JSON-lines store writes into.
        #[arg(long, default_value = "./tfsm-data")]
        data_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { config, data_dir } => match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime.block_on(run(config, data_dir)),
            Err(e) => Err(ExitError::new(1, format!("failed to start async runtime: {e}"))),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(code = err.code, message = %err.message, "tfsm exiting");
            ExitCode::from(err.code as u8)
        }
    }
}

async fn run(config_path: PathBuf, data_dir: PathBuf) -> Result<(), ExitError> {
    let cfg: RuntimeConfig = config::load(&config_path)?;

    let adapter: Arc<dyn tfsm_persistence::PersistenceAdapter> =
        Arc::new(JsonlAdapter::new(data_dir));
    adapter
        .create_database_if_absent("runtime")
        .await
        .map_err(|e| ExitError::storage(e.to_string()))?;
    adapter
        .create_database_if_absent("history")
        .await
        .map_err(|e| ExitError::storage(e.to_string()))?;

    let definition = ping::definition().map_err(|e| ExitError::schema(e.to_string()))?;
    let clock: Arc<dyn tfsm_core::Clock> = Arc::new(SystemClock);

    let context = Arc::new(RuntimeContext::new(
        cfg,
        definition,
        adapter,
        clock,
        "runtime",
        "machines",
        "history",
    ));
    let _background = context.spawn_background_loops();

    let demo_id = MachineId::new();
    context
        .registry
        .create_or_get(demo_id, ping::PingContext::default())
        .await;
    let _ = context.send_event(demo_id, Event::new("PING", serde_json::json!({}))).await;

    tracing::info!("tfsm runtime started, press ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| ExitError::new(1, format!("failed to listen for ctrl-c: {e}")))?;
    tracing::info!("shutting down");
    Ok(())
}
