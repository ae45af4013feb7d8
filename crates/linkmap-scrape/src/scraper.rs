// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client for the article-extractor sidecar.

use std::time::Duration;

use async_trait::async_trait;
use linkmap_core::types::ScrapeData;
use linkmap_core::{ArticleScraper, LinkmapError};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
}

/// Client for `POST {base}/scrape`.
///
/// The sidecar returns the extracted page as `ScrapeData` JSON, or a plain
/// error body on failure. Error bodies are surfaced verbatim in the error
/// message: the pipeline's permanent-error classification matches
/// substrings of the extractor's original wording.
#[derive(Debug, Clone)]
pub struct ScraperClient {
    client: reqwest::Client,
    base_url: String,
}

impl ScraperClient {
    pub fn new(base_url: String, timeout_secs: u64) -> Result<Self, LinkmapError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LinkmapError::Scrape {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl ArticleScraper for ScraperClient {
    async fn scrape(&self, url: &str) -> Result<ScrapeData, LinkmapError> {
        let endpoint = format!("{}/scrape", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&endpoint)
            .json(&ScrapeRequest { url })
            .send()
            .await
            .map_err(|e| LinkmapError::Scrape {
                message: format!("scrape request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LinkmapError::Scrape {
                message: body,
                source: None,
            });
        }

        let data: ScrapeData = response.json().await.map_err(|e| LinkmapError::Scrape {
            message: format!("failed to parse scrape response: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(url, markdown_len = data.markdown.len(), "page scraped");
        Ok(data)
    }
}
