// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `linkmap status` command implementation.
//!
//! Connects to the gateway health endpoint to display coordinator state
//! and uptime. Falls back gracefully when the coordinator is not running.

use std::io::IsTerminal;
use std::time::Duration;

use linkmap_config::model::LinkmapConfig;
use linkmap_core::LinkmapError;
use serde::{Deserialize, Serialize};

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub host: String,
    pub port: u16,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Run the `linkmap status` command.
pub async fn run_status(config: &LinkmapConfig, json: bool) -> Result<(), LinkmapError> {
    let host = &config.server.host;
    let port = config.server.port;
    let url = format!("http://{host}:{port}/health");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| LinkmapError::Internal(format!("failed to create HTTP client: {e}")))?;

    let result = client.get(&url).send().await;

    match result {
        Ok(resp) if resp.status().is_success() => {
            let health: HealthResponse = resp.json().await.map_err(|e| {
                LinkmapError::Internal(format!("failed to parse health response: {e}"))
            })?;

            let uptime_human = format_uptime(health.uptime_secs);

            if json {
                let status_resp = StatusResponse {
                    running: true,
                    status: health.status.clone(),
                    uptime_secs: Some(health.uptime_secs),
                    uptime_human: Some(uptime_human),
                    host: host.clone(),
                    port,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status_resp)
                        .unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                let use_color = std::io::stdout().is_terminal();
                print_running(&health.status, &uptime_human, use_color);
            }
        }
        _ => {
            if json {
                let status_resp = StatusResponse {
                    running: false,
                    status: "not running".to_string(),
                    uptime_secs: None,
                    uptime_human: None,
                    host: host.clone(),
                    port,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status_resp)
                        .unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                let use_color = std::io::stdout().is_terminal();
                print_offline(host, port, use_color);
            }
        }
    }

    Ok(())
}

fn print_running(status: &str, uptime: &str, use_color: bool) {
    if use_color {
        use colored::Colorize;
        println!("linkmap: {} {} (uptime: {uptime})", "✓".green(), status.green());
    } else {
        println!("linkmap: [OK] {status} (uptime: {uptime})");
    }
}

fn print_offline(host: &str, port: u16, use_color: bool) {
    if use_color {
        use colored::Colorize;
        println!("linkmap: {} {}", "✗".red(), "not running".red());
    } else {
        println!("linkmap: [FAIL] not running");
    }
    println!("endpoint: http://{host}:{port}/health");
    println!("start with: linkmap serve");
}
