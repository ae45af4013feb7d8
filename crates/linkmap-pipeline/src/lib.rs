// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The enrichment pipeline: scrape, summarize, embed, related, insight,
//! export.
//!
//! Registers the `process-link` and `refresh-related` task kinds against
//! the durable runtime and orchestrates the steps against the store gateway
//! and the external collaborators (LLM, embedder, extractor, OCR, probe
//! bridge).

pub mod errors;
pub mod handlers;
pub mod pipeline;
pub mod steps;
pub mod types;

pub use pipeline::{Pipeline, PipelineSettings, KIND_PROCESS_LINK, KIND_REFRESH_RELATED, QUEUE};
pub use types::{ProcessLinkParams, RefreshRelatedParams};
