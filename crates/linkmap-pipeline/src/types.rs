// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task parameters and step checkpoints.
//!
//! Checkpoints are intentionally compact: they never carry full page
//! content, so step memoization payloads stay small. Steps that need the
//! markdown re-read it from the store.

use linkmap_core::types::ScrapeData;
use serde::{Deserialize, Serialize};

/// Parameters for a `process-link` task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessLinkParams {
    pub user_id: i64,
    pub url: String,
    /// Set when re-spawning for a known link (retry, probe result).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_id: Option<i64>,
    /// Probe-supplied scrape payload; its presence selects the
    /// probe-supplied sub-path of the scrape step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_data: Option<ScrapeData>,
}

/// Parameters for a `refresh-related` task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRelatedParams {
    pub link_id: i64,
}

/// Result of the scrape step.
///
/// `Suspended` is the sentinel that makes the handler exit cleanly without
/// running subsequent steps: the task completes and the pipeline is
/// re-spawned when the probe returns a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScrapeOutcome {
    Suspended,
    Completed(ScrapeCheckpoint),
}

/// Compact scrape summary carried between steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeCheckpoint {
    pub title: Option<String>,
    pub og_description: Option<String>,
    pub site_name: Option<String>,
    pub markdown_length: usize,
    pub ocr_texts: Vec<String>,
}

/// Result of the summarize step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeCheckpoint {
    pub summary: String,
    pub tags: Vec<String>,
}

/// One retained relation from the related step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedEntry {
    pub link_id: i64,
    pub score: f64,
}
