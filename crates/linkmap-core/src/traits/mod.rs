// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams for external collaborators.
//!
//! The pipeline only ever talks to the LLM, the embedder, the article
//! extractor, and the image/OCR helper through these traits, so tests swap
//! in mocks and the HTTP clients stay behind one boundary each.

pub mod embedding;
pub mod media;
pub mod provider;
pub mod scraper;

pub use embedding::EmbeddingAdapter;
pub use media::MediaOcr;
pub use provider::ProviderAdapter;
pub use scraper::ArticleScraper;
