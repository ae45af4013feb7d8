// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the linkmap coordinator and probe.
//!
//! This crate provides the foundational error type, shared domain types,
//! and the trait seams behind which external collaborators (LLM provider,
//! embedder, article extractor, image OCR) live. All other workspace
//! crates depend on it.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LinkmapError;
pub use traits::{ArticleScraper, EmbeddingAdapter, MediaOcr, ProviderAdapter};
pub use types::{LinkStatus, ProbeEventStatus, ScrapeData, TaskState, UrlKind};
