// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device-code enrollment routes.
//!
//! The JSON endpoints are unauthenticated (the probe has no credentials
//! yet); the verification pages require a session.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Extension, Form, Json,
};
use linkmap_bridge::{DeviceAuthGrant, TokenPoll};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::SessionUser;
use crate::error::ApiResult;
use crate::server::AppState;

/// Request body for POST /api/auth/token.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub device_code: String,
}

/// Success body for POST /api/auth/token.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
struct TokenError {
    error: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct VerificationQuery {
    #[serde(default)]
    pub code: Option<String>,
}

/// Form body for POST /auth/device/authorize.
#[derive(Debug, Deserialize)]
pub struct AuthorizeForm {
    pub user_code: String,
}

/// POST /api/auth/device: start an enrollment.
pub async fn initiate(State(state): State<AppState>) -> ApiResult<Json<DeviceAuthGrant>> {
    let grant = state.bridge.initiate_device_auth(&state.web_base_url).await?;
    Ok(Json(grant))
}

/// POST /api/auth/token: poll for the bearer token.
pub async fn token(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> ApiResult<Response> {
    let poll = state.bridge.poll_device_token(&body.device_code).await?;
    let response = match poll {
        TokenPoll::Granted {
            access_token,
            user_id,
        } => Json(TokenResponse {
            access_token,
            user_id,
        })
        .into_response(),
        TokenPoll::Pending => (
            StatusCode::BAD_REQUEST,
            Json(TokenError {
                error: "authorization_pending",
            }),
        )
            .into_response(),
        TokenPoll::Expired => (
            StatusCode::BAD_REQUEST,
            Json(TokenError {
                error: "expired_token",
            }),
        )
            .into_response(),
        TokenPoll::Invalid => (
            StatusCode::BAD_REQUEST,
            Json(TokenError {
                error: "invalid_device_code",
            }),
        )
            .into_response(),
    };
    Ok(response)
}

/// GET /auth/device: the verification page with an optional prefilled code.
pub async fn verification_page(
    Extension(SessionUser(_user_id)): Extension<SessionUser>,
    Query(query): Query<VerificationQuery>,
) -> Html<String> {
    let code = query.code.unwrap_or_default();
    let escaped = escape_html(&code);
    Html(format!(
        "<!doctype html>\n<html><head><title>Connect a probe</title></head><body>\n\
         <h1>Connect a probe</h1>\n\
         <p>Enter the code shown by your probe.</p>\n\
         <form method=\"post\" action=\"/auth/device/authorize\">\n\
         <input name=\"user_code\" value=\"{escaped}\" placeholder=\"XXXX-XXXX\" autofocus>\n\
         <button type=\"submit\">Authorize</button>\n\
         </form>\n</body></html>"
    ))
}

/// POST /auth/device/authorize: consume a user code.
pub async fn authorize(
    State(state): State<AppState>,
    Extension(SessionUser(user_id)): Extension<SessionUser>,
    Form(form): Form<AuthorizeForm>,
) -> Html<String> {
    let code = form.user_code.trim().to_uppercase();
    match state.bridge.authorize_user_code(&code, user_id).await {
        Ok(()) => {
            info!(user_id, "probe authorized via verification page");
            Html(
                "<!doctype html>\n<html><body><h1>Probe connected</h1>\
                 <p>You can close this page; the probe will finish on its own.</p>\
                 </body></html>"
                    .to_string(),
            )
        }
        Err(e) => Html(format!(
            "<!doctype html>\n<html><body><h1>Could not authorize</h1><p>{}</p>\
             <p><a href=\"/auth/device\">Try again</a></p></body></html>",
            escape_html(&e.to_string())
        )),
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escaping() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
        assert_eq!(escape_html("ABCD-EFGH"), "ABCD-EFGH");
    }
}
