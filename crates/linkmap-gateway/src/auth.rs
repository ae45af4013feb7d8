// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the admission API.
//!
//! Two independent surfaces:
//! - `/api/*` routes carry a signed session cookie (`session=<user>.<mac>`;
//!   issuance itself is external, only verification happens here).
//! - `/api/probe/*` routes carry the probe device's bearer token, the sole
//!   capability minted by device-code enrollment.
//!
//! Both fail closed with 401.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use ring::hmac;
use tracing::debug;

use crate::server::AppState;

/// Verifier/signer for session cookie values.
#[derive(Clone)]
pub struct SessionAuth {
    key: Arc<hmac::Key>,
}

impl std::fmt::Debug for SessionAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuth").field("key", &"[redacted]").finish()
    }
}

impl SessionAuth {
    pub fn new(secret: &str) -> Self {
        Self {
            key: Arc::new(hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes())),
        }
    }

    /// Produce a cookie value for a user id. The issuing side and tests
    /// share this with [`verify`](Self::verify).
    pub fn sign(&self, user_id: i64) -> String {
        let id = user_id.to_string();
        let tag = hmac::sign(&self.key, id.as_bytes());
        format!("{id}.{}", hex::encode(tag.as_ref()))
    }

    /// Verify a cookie value; returns the user id when the MAC holds.
    pub fn verify(&self, value: &str) -> Option<i64> {
        let (id, mac_hex) = value.split_once('.')?;
        let user_id: i64 = id.parse().ok()?;
        let mac = hex::decode(mac_hex).ok()?;
        hmac::verify(&self.key, id.as_bytes(), &mac).ok()?;
        Some(user_id)
    }
}

/// The authenticated session user, inserted as a request extension.
#[derive(Debug, Clone, Copy)]
pub struct SessionUser(pub i64);

/// Extract the `session` cookie value from a Cookie header.
fn session_cookie(request: &Request) -> Option<&str> {
    let header = request.headers().get(header::COOKIE)?.to_str().ok()?;
    header.split(';').map(str::trim).find_map(|pair| {
        pair.strip_prefix("session=")
    })
}

/// Middleware validating the session cookie.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(cookie) = session_cookie(&request) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    let Some(user_id) = state.session.verify(cookie) else {
        debug!("session cookie failed verification");
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(SessionUser(user_id));
    Ok(next.run(request).await)
}

/// Middleware validating the probe bearer token.
///
/// A valid token resolves to its device (inserted as an extension) and
/// bumps the device's `last_seen_at`.
pub async fn probe_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let device = state
        .store
        .get_probe_device_by_token(token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let Some(device) = device else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    if let Err(e) = state.store.touch_probe_device(&device.id).await {
        debug!(error = %e, "failed to touch probe device");
    }

    request.extensions_mut().insert(device);
    Ok(next.run(request).await)
}
