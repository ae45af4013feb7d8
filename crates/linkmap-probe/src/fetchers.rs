// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local scrape fetchers.
//!
//! Both fetchers are external commands (the Twitter CLI, the headless
//! browser + extractor) invoked per scrape with the URL as the only
//! argument; they print scrape JSON on stdout. The subprocess is killed on
//! timeout or drop, so the browser is torn down on exit or failure.

use std::process::Stdio;
use std::time::Duration;

use linkmap_core::types::{ScrapeData, UrlKind};
use linkmap_core::LinkmapError;
use tracing::debug;

/// Timeout for the Twitter fetcher CLI.
const TWITTER_TIMEOUT: Duration = Duration::from_secs(60);

/// Navigation budget plus settle time for the headless browser.
const WEB_TIMEOUT: Duration = Duration::from_secs(30 + 2);

/// Dispatcher over the configured fetcher commands.
#[derive(Debug, Clone)]
pub struct Fetchers {
    twitter_cmd: String,
    browser_cmd: String,
}

impl Fetchers {
    pub fn new(twitter_cmd: String, browser_cmd: String) -> Self {
        Self {
            twitter_cmd,
            browser_cmd,
        }
    }

    /// Run the fetcher matching the request's URL kind.
    pub async fn fetch(&self, kind: UrlKind, url: &str) -> Result<ScrapeData, LinkmapError> {
        match kind {
            UrlKind::Twitter => run_command(&self.twitter_cmd, url, TWITTER_TIMEOUT).await,
            UrlKind::Web => run_command(&self.browser_cmd, url, WEB_TIMEOUT).await,
        }
    }
}

async fn run_command(
    command: &str,
    url: &str,
    timeout: Duration,
) -> Result<ScrapeData, LinkmapError> {
    debug!(command, url, "launching fetcher");
    let child = tokio::process::Command::new(command)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| LinkmapError::Timeout { duration: timeout })?
        .map_err(|e| LinkmapError::Scrape {
            message: format!("failed to run {command}: {e}"),
            source: Some(Box::new(e)),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LinkmapError::Scrape {
            message: format!("{command} exited with {}: {}", output.status, stderr.trim()),
            source: None,
        });
    }

    serde_json::from_slice(&output.stdout).map_err(|e| LinkmapError::Scrape {
        message: format!("{command} produced malformed scrape JSON: {e}"),
        source: Some(Box::new(e)),
    })
}
