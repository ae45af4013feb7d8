// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock embedding adapter with scripted vectors.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use linkmap_core::{EmbeddingAdapter, LinkmapError};
use tokio::sync::Mutex;

/// A mock embedder that pops one scripted vector per input text.
///
/// When the queue runs dry it returns the zero vector, which scores 0.5
/// against everything and therefore never crosses the relatedness
/// threshold.
pub struct MockEmbedder {
    vectors: Arc<Mutex<VecDeque<Vec<f32>>>>,
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            vectors: Arc::new(Mutex::new(VecDeque::new())),
            dimensions,
        }
    }

    /// Queue the vector returned for the next embedded text.
    pub async fn add_vector(&self, vector: Vec<f32>) {
        self.vectors.lock().await.push_back(vector);
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LinkmapError> {
        let mut queue = self.vectors.lock().await;
        Ok(texts
            .iter()
            .map(|_| {
                queue
                    .pop_front()
                    .unwrap_or_else(|| vec![0.0; self.dimensions])
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_vectors_then_zero_default() {
        let embedder = MockEmbedder::new(3);
        embedder.add_vector(vec![1.0, 0.0, 0.0]).await;

        let vectors = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 0.0, 0.0]);
    }
}
