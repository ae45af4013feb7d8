// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Article scraper adapter trait.

use async_trait::async_trait;

use crate::error::LinkmapError;
use crate::types::ScrapeData;

/// Adapter for the coordinator-side article extractor (JS-capable headless
/// browser plus content-extraction helper).
///
/// Errors carry the extractor's message text verbatim: the pipeline matches
/// it against a fixed list to classify permanent failures.
#[async_trait]
pub trait ArticleScraper: Send + Sync {
    /// Fetch and extract a URL into markdown plus OpenGraph metadata.
    async fn scrape(&self, url: &str) -> Result<ScrapeData, LinkmapError>;
}
