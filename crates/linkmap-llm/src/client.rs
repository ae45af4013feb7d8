// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! One shared reqwest client with the auth headers baked in. Rate limits
//! and server-side hiccups (429, 500, 503, 529) get a single second-chance
//! request after a short pause; anything else surfaces immediately with
//! the API's own error type and message in the text.

use std::time::Duration;

use async_trait::async_trait;
use linkmap_core::types::{CompletionRequest, CompletionResponse};
use linkmap_core::{LinkmapError, ProviderAdapter};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use tracing::debug;

use crate::types::{ApiErrorResponse, ApiMessage, MessageRequest, MessageResponse};

/// Base URL for the Anthropic Messages API.
const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header value.
const API_VERSION: &str = "2023-06-01";

/// Pause before the second-chance request.
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Outcome of a single request attempt.
enum Attempt {
    Done(MessageResponse),
    /// Worth one more try; carries the status and body for the final error.
    Retry(StatusCode, String),
}

/// HTTP client for Anthropic API communication.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    model: String,
    base_url: String,
}

impl AnthropicClient {
    /// Creates a new Anthropic API client.
    pub fn new(api_key: &str, model: String) -> Result<Self, LinkmapError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|_| {
                LinkmapError::Config("API key contains characters invalid in a header".to_string())
            })?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LinkmapError::Provider {
                message: format!("cannot construct the Anthropic HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            model,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Sends a non-streaming request and returns the full response.
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, LinkmapError> {
        match self.send_once(request).await? {
            Attempt::Done(response) => Ok(response),
            Attempt::Retry(status, _) => {
                debug!(status = %status, "transient Anthropic failure, one more try");
                tokio::time::sleep(RETRY_PAUSE).await;
                match self.send_once(request).await? {
                    Attempt::Done(response) => Ok(response),
                    Attempt::Retry(status, body) => Err(decode_api_error(status, &body)),
                }
            }
        }
    }

    async fn send_once(&self, request: &MessageRequest) -> Result<Attempt, LinkmapError> {
        let response = self
            .http
            .post(&self.base_url)
            .json(request)
            .send()
            .await
            .map_err(|e| LinkmapError::Provider {
                message: format!("could not reach the Anthropic API: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if status.is_success() {
            let parsed = response
                .json::<MessageResponse>()
                .await
                .map_err(|e| LinkmapError::Provider {
                    message: format!("Anthropic response was not the expected JSON: {e}"),
                    source: Some(Box::new(e)),
                })?;
            debug!(model = parsed.model.as_str(), "completion received");
            return Ok(Attempt::Done(parsed));
        }

        let body = response.text().await.unwrap_or_default();
        if worth_retrying(status) {
            Ok(Attempt::Retry(status, body))
        } else {
            Err(decode_api_error(status, &body))
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, LinkmapError> {
        let api_request = MessageRequest {
            model: self.model.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: request.prompt,
            }],
            system: request.system,
            max_tokens: request.max_tokens,
            stream: false,
        };
        let response = self.complete_message(&api_request).await?;
        Ok(CompletionResponse {
            content: response.text(),
            model: response.model,
        })
    }
}

/// Rate limits and transient server-side failures deserve a second try.
fn worth_retrying(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || matches!(status.as_u16(), 500 | 503 | 529)
}

/// Turn a failing response into a provider error, preferring the API's own
/// error envelope over the raw body.
fn decode_api_error(status: StatusCode, body: &str) -> LinkmapError {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(envelope) => format!(
            "{} from Anthropic: {}",
            envelope.error.type_, envelope.error.message
        ),
        Err(_) => format!("unexpected status {status} from Anthropic: {body}"),
    };
    LinkmapError::Provider {
        message,
        source: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_against(server: &MockServer) -> AnthropicClient {
        AnthropicClient::new("key-under-test", "claude-sonnet-4-20250514".into())
            .unwrap()
            .with_base_url(server.uri())
    }

    fn sample_request() -> MessageRequest {
        MessageRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: "Two sentences about this page, please.".into(),
            }],
            system: Some("You summarize saved pages.".into()),
            max_tokens: 512,
            stream: false,
        }
    }

    fn message_json(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 42, "output_tokens": 7}
        })
    }

    fn api_error_json(kind: &str, message: &str) -> serde_json::Value {
        serde_json::json!({ "error": { "type": kind, "message": message } })
    }

    #[tokio::test]
    async fn success_parses_and_sends_auth_headers() {
        let server = MockServer::start().await;

        // The auth matchers double as the header regression test.
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-api-key", "key-under-test"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_json("A short summary.")))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_against(&server)
            .complete_message(&sample_request())
            .await
            .unwrap();
        assert_eq!(response.text(), "A short summary.");
        assert_eq!(response.usage.input_tokens, 42);
        assert_eq!(response.stop_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn rate_limit_gets_a_second_chance() {
        let server = MockServer::start().await;

        // One 429, consumed first; the catch-all 200 serves the retry.
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(api_error_json("rate_limit_error", "slow down")),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_json("eventually")))
            .mount(&server)
            .await;

        let response = client_against(&server)
            .complete_message(&sample_request())
            .await
            .unwrap();
        assert_eq!(response.text(), "eventually");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(api_error_json("invalid_request_error", "unknown model")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client_against(&server)
            .complete_message(&sample_request())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("invalid_request_error from Anthropic"), "got: {err}");
        assert!(err.contains("unknown model"), "got: {err}");
    }

    #[tokio::test]
    async fn persistent_overload_fails_after_the_retry() {
        let server = MockServer::start().await;

        // 529 is Anthropic's overloaded status; both attempts hit it.
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(529)
                    .set_body_json(api_error_json("overloaded_error", "try later")),
            )
            .expect(2)
            .mount(&server)
            .await;

        let err = client_against(&server)
            .complete_message(&sample_request())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("overloaded_error"), "got: {err}");
    }

    #[tokio::test]
    async fn garbage_error_body_falls_back_to_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(403).set_body_string("<html>forbidden</html>"))
            .mount(&server)
            .await;

        let err = client_against(&server)
            .complete_message(&sample_request())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("unexpected status 403"), "got: {err}");
    }

    #[tokio::test]
    async fn provider_adapter_maps_request_and_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_json("a summary")))
            .mount(&server)
            .await;

        let response = client_against(&server)
            .complete(CompletionRequest {
                system: Some("You summarize pages.".into()),
                prompt: "content here".into(),
                max_tokens: 256,
            })
            .await
            .unwrap();
        assert_eq!(response.content, "a summary");
        assert_eq!(response.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn retry_set_is_rate_limit_plus_server_hiccups() {
        for code in [429u16, 500, 503, 529] {
            assert!(worth_retrying(StatusCode::from_u16(code).unwrap()), "{code}");
        }
        for code in [400u16, 401, 403, 404, 502] {
            assert!(!worth_retrying(StatusCode::from_u16(code).unwrap()), "{code}");
        }
    }
}
