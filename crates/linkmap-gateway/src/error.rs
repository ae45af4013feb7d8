// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use linkmap_core::LinkmapError;
use serde::Serialize;
use tracing::error;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Wrapper mapping `LinkmapError` onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(pub LinkmapError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<LinkmapError> for ApiError {
    fn from(e: LinkmapError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LinkmapError::Validation(_) => StatusCode::BAD_REQUEST,
            LinkmapError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LinkmapError::NotFound(_) => StatusCode::NOT_FOUND,
            LinkmapError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            // Integrity and everything else surface as 500 on API paths.
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
