// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait.

use async_trait::async_trait;

use crate::error::LinkmapError;

/// Adapter for the embedding model that produces summary vectors.
#[async_trait]
pub trait EmbeddingAdapter: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LinkmapError>;

    /// Dimensionality of the produced vectors.
    fn dimensions(&self) -> usize;
}
