// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! linkmap-probe: the user-side scrape agent.
//!
//! Enrolls via device-code flow, subscribes to the coordinator's event
//! stream, runs scrapes with local browser context, and posts results
//! back. Exit codes: 0 success, 1 error, 2 invalid arguments (clap).

mod api;
mod config;
mod daemon;
mod events;
mod fetchers;
mod login;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use linkmap_core::LinkmapError;
use tracing::info;

use crate::api::CoordinatorClient;
use crate::config::{ProbeConfig, StateDir};
use crate::fetchers::Fetchers;

/// linkmap probe agent.
#[derive(Parser, Debug)]
#[command(name = "linkmap-probe", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enroll this machine with the coordinator via device-code flow.
    Login {
        /// Coordinator base URL, e.g. https://links.example.com
        #[arg(long)]
        api_base: String,
    },
    /// Start the probe daemon (background unless --foreground).
    Run {
        /// Stay attached to the terminal instead of daemonizing.
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the running daemon.
    Stop,
    /// Show whether the daemon is running.
    Status,
    /// Clear the stored token.
    Logout,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let state = match StateDir::default_location() {
        Ok(state) => state,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };

    let result = match cli.command {
        Commands::Login { api_base } => login::run_login(&api_base, &state).await,
        Commands::Run { foreground } => run(&state, foreground).await,
        Commands::Stop => stop(&state),
        Commands::Status => {
            status(&state);
            Ok(())
        }
        Commands::Logout => login::run_logout(&state),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(state: &StateDir, foreground: bool) -> Result<(), LinkmapError> {
    state.ensure()?;

    if !foreground {
        if let Some(pid) = daemon::daemon_running(&state.pid_path()) {
            return Err(LinkmapError::Validation(format!(
                "probe already running (pid {pid})"
            )));
        }
        let pid = daemon::spawn_background(&state.log_path(), &state.pid_path())?;
        println!("probe started (pid {pid})");
        println!("log: {}", state.log_path().display());
        return Ok(());
    }

    init_tracing();

    let config = ProbeConfig::load(&state.config_path())?.ok_or_else(|| {
        LinkmapError::Config("no configuration; run `linkmap-probe login` first".to_string())
    })?;
    let token = config.access_token.clone().ok_or_else(|| {
        LinkmapError::Config("no token; run `linkmap-probe login` first".to_string())
    })?;

    daemon::write_pid(&state.pid_path(), std::process::id() as i32)?;

    let client = CoordinatorClient::new(config.api_base.clone(), token)?;
    let fetchers = Arc::new(Fetchers::new(
        config.twitter_fetcher_cmd.clone(),
        config.browser_fetcher_cmd.clone(),
    ));

    info!(api_base = config.api_base.as_str(), "probe starting");
    let cancel = daemon::install_signal_handler();
    events::run_event_loop(client, fetchers, cancel).await;

    daemon::remove_pid(&state.pid_path());
    info!("probe stopped");
    Ok(())
}

fn stop(state: &StateDir) -> Result<(), LinkmapError> {
    let pid = daemon::stop_daemon(&state.pid_path())?;
    println!("probe stopped (pid {pid})");
    Ok(())
}

fn status(state: &StateDir) {
    use std::io::IsTerminal;
    let use_color = std::io::stdout().is_terminal();

    match daemon::daemon_running(&state.pid_path()) {
        Some(pid) => {
            if use_color {
                println!("probe: {} (pid {pid})", "running".green());
            } else {
                println!("probe: running (pid {pid})");
            }
        }
        None => {
            if use_color {
                println!("probe: {}", "not running".red());
            } else {
                println!("probe: not running");
            }
            println!("start with: linkmap-probe run");
        }
    }
}

/// Tracing to stderr; the daemonized child has stderr redirected to the
/// log file.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("linkmap_probe=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
