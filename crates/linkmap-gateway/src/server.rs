// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router assembly and server lifecycle.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use linkmap_bridge::ProbeBridge;
use linkmap_core::LinkmapError;
use linkmap_pipeline::Pipeline;
use linkmap_storage::Store;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::auth::{probe_auth_middleware, session_auth_middleware, SessionAuth};
use crate::{device_auth, handlers, probe_routes};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub pipeline: Arc<Pipeline>,
    pub bridge: Arc<ProbeBridge>,
    pub session: SessionAuth,
    pub web_base_url: String,
    pub start_time: Instant,
}

/// Build the full admission router.
pub fn router(state: AppState) -> Router {
    // Session-cookie routes.
    let session_routes = Router::new()
        .route("/api/links", post(handlers::create_link).get(handlers::list_links))
        .route(
            "/api/links/:id",
            get(handlers::get_link_detail).delete(handlers::delete_link),
        )
        .route("/api/links/:id/refresh", post(handlers::refresh_link))
        .route("/api/retry", post(handlers::retry_failed))
        .route("/api/retry/:id", post(handlers::retry_one))
        .route("/api/search", get(handlers::search))
        .route("/api/probe/status", get(handlers::probe_status))
        .route("/auth/device", get(device_auth::verification_page))
        .route("/auth/device/authorize", post(device_auth::authorize))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session_auth_middleware,
        ));

    // Probe bearer routes.
    let probe = Router::new()
        .route("/api/probe/subscribe_events", get(probe_routes::subscribe_events))
        .route("/api/probe/receive_result", post(probe_routes::receive_result))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            probe_auth_middleware,
        ));

    // Unauthenticated: enrollment endpoints and liveness.
    let public = Router::new()
        .route("/api/auth/device", post(device_auth::initiate))
        .route("/api/auth/token", post(device_auth::token))
        .route("/health", get(handlers::health));

    Router::new()
        .merge(session_routes)
        .merge(probe)
        .merge(public)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the cancellation token fires.
pub async fn serve(
    host: &str,
    port: u16,
    state: AppState,
    cancel: CancellationToken,
) -> Result<(), LinkmapError> {
    let app = router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LinkmapError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    info!("admission API listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| LinkmapError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
