// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! linkmap: the link-ingestion and enrichment coordinator.
//!
//! This is the binary entry point for the coordinator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod status;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// linkmap: link ingestion and enrichment coordinator.
#[derive(Parser, Debug)]
#[command(name = "linkmap", version, about, long_about = None)]
struct Cli {
    /// Explicit config file path (defaults to the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the coordinator: admission API, pipeline workers, probe bridge.
    Serve,
    /// Show whether a coordinator is running and its uptime.
    Status {
        /// Output machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => linkmap_config::load_config_from_path(path),
        None => linkmap_config::load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Status { json } => status::run_status(&config, json).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}
