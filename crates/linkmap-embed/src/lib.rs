// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the external embedding model.
//!
//! Speaks the common `/v1/embeddings` shape: request `{model, input: [..]}`,
//! response `{data: [{index, embedding: [..]}], model}`. The summarize
//! pipeline step feeds summaries through this client into the store's
//! vector column.

use std::time::Duration;

use async_trait::async_trait;
use linkmap_core::{EmbeddingAdapter, LinkmapError};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedItem>,
}

#[derive(Debug, Deserialize)]
struct EmbedItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an embeddings endpoint.
#[derive(Debug, Clone)]
pub struct EmbedClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl EmbedClient {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        model: String,
        dimensions: usize,
    ) -> Result<Self, LinkmapError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LinkmapError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            model,
            dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingAdapter for EmbedClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LinkmapError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut request = self.client.post(&self.endpoint).json(&EmbedRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| LinkmapError::Provider {
            message: format!("embedding request failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LinkmapError::Provider {
                message: format!("embedding endpoint returned {status}: {body}"),
                source: None,
            });
        }

        let parsed: EmbedResponse =
            response.json().await.map_err(|e| LinkmapError::Provider {
                message: format!("failed to parse embedding response: {e}"),
                source: Some(Box::new(e)),
            })?;

        if parsed.data.len() != texts.len() {
            return Err(LinkmapError::Provider {
                message: format!(
                    "embedding endpoint returned {} vectors for {} inputs",
                    parsed.data.len(),
                    texts.len()
                ),
                source: None,
            });
        }

        // The endpoint reports an index per item; order by it.
        let mut items = parsed.data;
        items.sort_by_key(|item| item.index);
        debug!(count = items.len(), "embeddings received");
        Ok(items.into_iter().map(|item| item.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> EmbedClient {
        EmbedClient::new(uri.to_string(), Some("sk-test".into()), "text-embedding-3-small".into(), 4)
            .unwrap()
    }

    #[tokio::test]
    async fn embed_batch_preserves_order() {
        let server = MockServer::start().await;

        // Out-of-order indexes must be re-sorted.
        let body = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [1.0, 1.0, 1.0, 1.0]},
                {"index": 0, "embedding": [0.0, 0.0, 0.0, 0.0]}
            ],
            "model": "text-embedding-3-small"
        });

        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(
                serde_json::json!({"model": "text-embedding-3-small"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let vectors = client
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vec![0.0, 0.0, 0.0, 0.0]);
        assert_eq!(vectors[1], vec![1.0, 1.0, 1.0, 1.0]);
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        // No server: the call must not hit the network.
        let client = client("http://127.0.0.1:1");
        let vectors = client.embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn error_status_surfaces_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let err = client.embed(&["x".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("bad key"));
    }

    #[tokio::test]
    async fn count_mismatch_is_an_error() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "data": [{"index": 0, "embedding": [0.1, 0.2, 0.3, 0.4]}],
            "model": "text-embedding-3-small"
        });

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let err = client
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 vectors for 2 inputs"));
    }

    #[test]
    fn dimensions_accessor() {
        let client = EmbedClient::new("http://x".into(), None, "m".into(), 1536).unwrap();
        assert_eq!(client.dimensions(), 1536);
    }
}
