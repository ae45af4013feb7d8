// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider with pre-configured responses.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use linkmap_core::types::{CompletionRequest, CompletionResponse};
use linkmap_core::{LinkmapError, ProviderAdapter};
use tokio::sync::Mutex;

/// Default response: valid summarizer JSON so the happy path stays happy
/// when a test does not queue anything explicit.
const DEFAULT_RESPONSE: &str = r#"{"summary":"mock summary","tags":["mock"]}"#;

/// A mock LLM provider that pops responses from a FIFO queue.
///
/// When the queue is empty, a default summarizer-shaped JSON response is
/// returned. Queued errors surface as provider failures, for retry tests.
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Result<String, String>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Ok).collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful response.
    pub async fn add_response(&self, text: impl Into<String>) {
        self.responses.lock().await.push_back(Ok(text.into()));
    }

    /// Queue a provider failure.
    pub async fn add_error(&self, message: impl Into<String>) {
        self.responses.lock().await.push_back(Err(message.into()));
    }

    /// Every request the provider has seen, in order.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, LinkmapError> {
        self.requests.lock().await.push(request);

        let next = self.responses.lock().await.pop_front();
        match next {
            Some(Ok(content)) => Ok(CompletionResponse {
                content,
                model: "mock-model".to_string(),
            }),
            Some(Err(message)) => Err(LinkmapError::Provider {
                message,
                source: None,
            }),
            None => Ok(CompletionResponse {
                content: DEFAULT_RESPONSE.to_string(),
                model: "mock-model".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: None,
            prompt: "p".into(),
            max_tokens: 16,
        }
    }

    #[tokio::test]
    async fn queued_responses_in_order_then_default() {
        let provider = MockProvider::new();
        provider.add_response("first").await;
        provider.add_response("second").await;

        assert_eq!(provider.complete(request()).await.unwrap().content, "first");
        assert_eq!(provider.complete(request()).await.unwrap().content, "second");
        assert_eq!(
            provider.complete(request()).await.unwrap().content,
            DEFAULT_RESPONSE
        );
    }

    #[tokio::test]
    async fn queued_error_surfaces() {
        let provider = MockProvider::new();
        provider.add_error("llm down").await;
        let err = provider.complete(request()).await.unwrap_err();
        assert!(err.to_string().contains("llm down"));
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let provider = MockProvider::new();
        provider.complete(request()).await.unwrap();
        let seen = provider.requests().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].prompt, "p");
    }
}
