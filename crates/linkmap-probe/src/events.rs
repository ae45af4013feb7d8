// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The probe's event loop.
//!
//! One outstanding subscription at a time. The SSE read lane never blocks
//! on a scrape: each `scrape_request` spawns a background task that runs
//! the fetcher and POSTs the result. Reconnects back off
//! 5 -> 10 -> 20 -> 40 -> 60 seconds, resetting once a connection delivers
//! its first event; a 60-second heartbeat deadline tears down silent
//! connections.

use std::sync::Arc;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use linkmap_core::types::{ScrapeRequestEvent, ScrapeResultPayload};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::CoordinatorClient;
use crate::fetchers::Fetchers;

/// Deadline for any event (including pings) before reconnecting.
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Reconnect backoff schedule in seconds.
const BACKOFF_SCHEDULE: [u64; 5] = [5, 10, 20, 40, 60];

/// Run the subscription loop until the cancellation token fires.
pub async fn run_event_loop(
    client: CoordinatorClient,
    fetchers: Arc<Fetchers>,
    cancel: CancellationToken,
) {
    let mut backoff_index = 0usize;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match client.subscribe().await {
            Ok(response) if response.status().is_success() => {
                info!("event subscription connected");
                let reset =
                    read_stream(response, &client, &fetchers, &cancel).await;
                if reset {
                    backoff_index = 0;
                }
                if cancel.is_cancelled() {
                    break;
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "subscription rejected");
            }
            Err(e) => {
                warn!(error = %e, "subscription connect failed");
            }
        }

        let delay = BACKOFF_SCHEDULE[backoff_index];
        backoff_index = (backoff_index + 1).min(BACKOFF_SCHEDULE.len() - 1);
        debug!(delay_secs = delay, "reconnecting after backoff");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(delay)) => {}
        }
    }
    info!("event loop stopped");
}

/// Consume one subscription until it closes, errors, or misses its
/// heartbeat. Returns whether the connection delivered at least one event
/// (which resets the reconnect backoff).
async fn read_stream(
    response: reqwest::Response,
    client: &CoordinatorClient,
    fetchers: &Arc<Fetchers>,
    cancel: &CancellationToken,
) -> bool {
    let mut stream = response.bytes_stream().eventsource();
    let mut received_any = false;

    loop {
        let next = tokio::time::timeout(HEARTBEAT_TIMEOUT, stream.next());
        tokio::select! {
            _ = cancel.cancelled() => return received_any,
            result = next => match result {
                Err(_) => {
                    warn!("heartbeat deadline missed, reconnecting");
                    return received_any;
                }
                Ok(None) => {
                    warn!("subscription stream closed by server");
                    return received_any;
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "subscription stream error");
                    return received_any;
                }
                Ok(Some(Ok(event))) => {
                    received_any = true;
                    dispatch(event, client, fetchers);
                }
            }
        }
    }
}

/// Route one SSE event. Scrapes run concurrently with the read lane.
fn dispatch(
    event: eventsource_stream::Event,
    client: &CoordinatorClient,
    fetchers: &Arc<Fetchers>,
) {
    match event.event.as_str() {
        // Any event resets the heartbeat deadline; pings carry nothing else.
        "ping" => debug!("ping"),
        "scrape_request" => match serde_json::from_str::<ScrapeRequestEvent>(&event.data) {
            Ok(request) => {
                info!(
                    event_id = request.event_id.as_str(),
                    url = request.url.as_str(),
                    "scrape request received"
                );
                let client = client.clone();
                let fetchers = fetchers.clone();
                tokio::spawn(async move {
                    handle_scrape_request(client, fetchers, request).await;
                });
            }
            Err(e) => warn!(error = %e, "malformed scrape_request payload"),
        },
        other => debug!(event = other, "ignoring unknown event type"),
    }
}

/// Run the fetcher and POST the result, success or failure.
pub(crate) async fn handle_scrape_request(
    client: CoordinatorClient,
    fetchers: Arc<Fetchers>,
    request: ScrapeRequestEvent,
) {
    let payload = match fetchers.fetch(request.url_type, &request.url).await {
        Ok(data) => ScrapeResultPayload {
            event_id: request.event_id.clone(),
            success: true,
            data: Some(data),
            error: None,
        },
        Err(e) => ScrapeResultPayload {
            event_id: request.event_id.clone(),
            success: false,
            data: None,
            error: Some(e.to_string()),
        },
    };

    if let Err(e) = client.post_result(&payload).await {
        warn!(
            event_id = request.event_id.as_str(),
            error = %e,
            "failed to deliver scrape result"
        );
    }
}
