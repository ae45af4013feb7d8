// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client for the image download + OCR helper.

use std::time::Duration;

use async_trait::async_trait;
use linkmap_core::types::MediaItem;
use linkmap_core::{LinkmapError, MediaOcr};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    media: &'a [MediaItem],
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    texts: Vec<String>,
}

/// Client for `POST {base}/ocr`.
///
/// Callers treat every failure here as non-fatal; the scrape step logs and
/// proceeds without OCR text.
#[derive(Debug, Clone)]
pub struct OcrClient {
    client: reqwest::Client,
    base_url: String,
}

impl OcrClient {
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
impl MediaOcr for OcrClient {
    async fn extract_text(&self, media: &[MediaItem]) -> Result<Vec<String>, LinkmapError> {
        if media.is_empty() {
            return Ok(vec![]);
        }

        let endpoint = format!("{}/ocr", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&endpoint)
            .json(&OcrRequest { media })
            .send()
            .await
            .map_err(|e| LinkmapError::Scrape {
                message: format!("OCR request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LinkmapError::Scrape {
                message: format!("OCR endpoint returned {status}: {body}"),
                source: None,
            });
        }

        let parsed: OcrResponse = response.json().await.map_err(|e| LinkmapError::Scrape {
            message: format!("failed to parse OCR response: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(items = media.len(), texts = parsed.texts.len(), "OCR extracted");
        Ok(parsed.texts)
    }
}
