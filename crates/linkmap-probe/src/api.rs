// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the coordinator's probe endpoints.

use std::time::Duration;

use linkmap_core::types::ScrapeResultPayload;
use linkmap_core::LinkmapError;
use serde::Deserialize;
use tracing::debug;

/// Enrollment grant returned by POST /api/auth/device.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthGrant {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    pub interval: u64,
}

/// Outcome of a token poll against POST /api/auth/token.
#[derive(Debug, Clone)]
pub enum TokenPoll {
    Pending,
    Expired,
    Invalid,
    Granted { access_token: String, user_id: i64 },
}

#[derive(Debug, Deserialize)]
struct TokenSuccess {
    access_token: String,
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
}

fn provider_err(message: String) -> LinkmapError {
    LinkmapError::Provider {
        message,
        source: None,
    }
}

/// Client for an enrolled probe.
///
/// The underlying reqwest client carries no total timeout: the
/// subscription response is a long-lived stream. Short-lived calls set
/// per-request timeouts instead.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl CoordinatorClient {
    pub fn new(api_base: String, token: String) -> Result<Self, LinkmapError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| provider_err(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Open the event subscription. The caller owns the streaming response.
    pub async fn subscribe(&self) -> Result<reqwest::Response, LinkmapError> {
        let url = format!("{}/api/probe/subscribe_events", self.api_base);
        self.http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| provider_err(format!("subscribe failed: {e}")))
    }

    /// POST a scrape result back to the coordinator.
    pub async fn post_result(&self, payload: &ScrapeResultPayload) -> Result<(), LinkmapError> {
        let url = format!("{}/api/probe/receive_result", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(30))
            .json(payload)
            .send()
            .await
            .map_err(|e| provider_err(format!("result POST failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_err(format!(
                "result POST returned {status}: {body}"
            )));
        }
        debug!(event_id = payload.event_id.as_str(), "result delivered");
        Ok(())
    }
}

/// POST /api/auth/device (unauthenticated).
pub async fn initiate_device_auth(api_base: &str) -> Result<DeviceAuthGrant, LinkmapError> {
    let url = format!("{}/api/auth/device", api_base.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&url)
        .timeout(Duration::from_secs(15))
        .json(&serde_json::json!({}))
        .send()
        .await
        .map_err(|e| provider_err(format!("device auth request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(provider_err(format!("device auth returned {status}: {body}")));
    }
    response
        .json()
        .await
        .map_err(|e| provider_err(format!("malformed device auth response: {e}")))
}

/// POST /api/auth/token (unauthenticated).
pub async fn poll_device_token(
    api_base: &str,
    device_code: &str,
) -> Result<TokenPoll, LinkmapError> {
    let url = format!("{}/api/auth/token", api_base.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&url)
        .timeout(Duration::from_secs(15))
        .json(&serde_json::json!({ "device_code": device_code }))
        .send()
        .await
        .map_err(|e| provider_err(format!("token poll failed: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| provider_err(format!("token poll body read failed: {e}")))?;

    if status.is_success() {
        let success: TokenSuccess = serde_json::from_str(&body)
            .map_err(|e| provider_err(format!("malformed token response: {e}")))?;
        return Ok(TokenPoll::Granted {
            access_token: success.access_token,
            user_id: success.user_id,
        });
    }

    match serde_json::from_str::<TokenError>(&body) {
        Ok(err) => match err.error.as_str() {
            "authorization_pending" => Ok(TokenPoll::Pending),
            "expired_token" => Ok(TokenPoll::Expired),
            "invalid_device_code" => Ok(TokenPoll::Invalid),
            other => Err(provider_err(format!("token poll error: {other}"))),
        },
        Err(_) => Err(provider_err(format!("token poll returned {status}: {body}"))),
    }
}
