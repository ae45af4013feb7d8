// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Probe-facing routes: the SSE subscription and the result callback.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    Extension, Json,
};
use futures::{Stream, StreamExt};
use linkmap_core::types::ScrapeResultPayload;
use linkmap_storage::ProbeDevice;
use serde::Serialize;
use tracing::{error, info};

use crate::error::ApiResult;
use crate::server::AppState;

/// Response body for POST /api/probe/receive_result.
#[derive(Debug, Serialize)]
pub struct ReceiveResultResponse {
    pub ok: bool,
}

/// GET /api/probe/subscribe_events: the long-lived event stream.
///
/// Dropping the response (client disconnect) tears the subscription down;
/// replay of still-pending events happens on the next subscribe.
pub async fn subscribe_events(
    State(state): State<AppState>,
    Extension(device): Extension<ProbeDevice>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    info!(device_id = device.id.as_str(), user_id = device.user_id, "probe stream opened");
    let subscription = state.bridge.subscribe(device.user_id).await?;
    let stream = subscription
        .map(|frame| Ok::<Event, Infallible>(Event::default().event(frame.event).data(frame.data)));
    Ok(Sse::new(stream))
}

/// POST /api/probe/receive_result: the result callback.
///
/// Marks the event and, on success, hands the payload to the pipeline
/// asynchronously; the probe is never blocked on the re-spawned task.
pub async fn receive_result(
    State(state): State<AppState>,
    Extension(device): Extension<ProbeDevice>,
    Json(payload): Json<ScrapeResultPayload>,
) -> ApiResult<Json<ReceiveResultResponse>> {
    let event_id = payload.event_id.clone();
    let data = state.bridge.receive_result(&device, payload).await?;

    if let Some(data) = data {
        let pipeline = state.pipeline.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.handle_probe_result(&event_id, data).await {
                error!(event_id = event_id.as_str(), error = %e, "probe result re-spawn failed");
            }
        });
    }

    Ok(Json(ReceiveResultResponse { ok: true }))
}
