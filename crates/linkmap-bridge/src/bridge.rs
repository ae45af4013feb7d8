// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription multimap and event push.
//!
//! Delivery is at-least-once: a live push marks the event `sent`, an event
//! nobody received stays `pending` and is replayed when a probe next
//! subscribes. Events in `sent` but never completed are considered
//! in-flight and are not re-sent automatically.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use linkmap_core::types::{ProbeEventStatus, ScrapeData, ScrapeRequestEvent, ScrapeResultPayload};
use linkmap_core::LinkmapError;
use linkmap_storage::models::{LinkUpdate, ProbeDevice, ProbeEvent};
use linkmap_storage::Store;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Heartbeat cadence on every subscription.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Per-subscription channel depth; a slow consumer backpressures only its
/// own sink.
const SINK_BUFFER: usize = 64;

/// One server-push frame: `event: <type>\ndata: <json>\n\n` on the wire.
#[derive(Debug, Clone)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

struct Sink {
    id: String,
    tx: mpsc::Sender<SseFrame>,
}

type SinkMap = Arc<Mutex<HashMap<i64, Vec<Sink>>>>;

/// Server side of the probe bridge.
pub struct ProbeBridge {
    store: Arc<Store>,
    sinks: SinkMap,
}

impl ProbeBridge {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            sinks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The store this bridge persists through.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Register a new subscription for a user.
    ///
    /// On connect, every `pending` event for the user is replayed onto the
    /// new sink in creation order and marked `sent`. A 30-second `ping`
    /// heartbeat runs for as long as the sink is connected.
    pub async fn subscribe(&self, user_id: i64) -> Result<Subscription, LinkmapError> {
        let (tx, rx) = mpsc::channel::<SseFrame>(SINK_BUFFER);
        let sink_id = uuid::Uuid::new_v4().to_string();

        {
            let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
            sinks.entry(user_id).or_default().push(Sink {
                id: sink_id.clone(),
                tx: tx.clone(),
            });
        }
        info!(user_id, sink = sink_id.as_str(), "probe subscribed");

        // Replay pending events in creation order. The consumer is not
        // reading yet, so replay must not block on a full channel: whatever
        // does not fit stays pending and is replayed on the next connect.
        for event in self.store.list_pending_probe_events(user_id).await? {
            let frame = scrape_request_frame(&event)?;
            match tx.try_send(frame) {
                Ok(()) => {
                    self.store
                        .set_probe_event_status(&event.id, ProbeEventStatus::Sent, None, None)
                        .await?;
                    debug!(event_id = event.id.as_str(), "pending event replayed");
                }
                Err(_) => {
                    warn!(user_id, "subscription buffer full during replay");
                    break;
                }
            }
        }

        let heartbeat_tx = tx;
        let heartbeat = tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
            // The first tick fires immediately; the replay above already
            // proved the connection live, so skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                let frame = SseFrame {
                    event: "ping".to_string(),
                    data: "{}".to_string(),
                };
                if heartbeat_tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription {
            rx,
            user_id,
            sink_id,
            sinks: self.sinks.clone(),
            heartbeat,
        })
    }

    /// Number of live sinks for a user.
    pub fn active_subscriptions(&self, user_id: i64) -> usize {
        self.sinks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&user_id)
            .map(|sinks| sinks.len())
            .unwrap_or(0)
    }

    /// Write an event to every active sink for the user, concurrently.
    ///
    /// No acknowledgement and no retries at this layer; retransmission is
    /// the pending-event replay on reconnect. Returns the number of sinks
    /// that accepted the frame.
    pub async fn push(&self, user_id: i64, event_type: &str, data: String) -> usize {
        let targets: Vec<mpsc::Sender<SseFrame>> = {
            let sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
            sinks
                .get(&user_id)
                .map(|sinks| sinks.iter().map(|s| s.tx.clone()).collect())
                .unwrap_or_default()
        };

        let sends = targets.into_iter().map(|tx| {
            let frame = SseFrame {
                event: event_type.to_string(),
                data: data.clone(),
            };
            async move { tx.send(frame).await.is_ok() }
        });

        futures::future::join_all(sends)
            .await
            .into_iter()
            .filter(|delivered| *delivered)
            .count()
    }

    /// Push a `scrape_request` for the given event to the owning user's
    /// probes, marking it `sent` when at least one sink received it.
    pub async fn dispatch_scrape_request(
        &self,
        event: &ProbeEvent,
    ) -> Result<usize, LinkmapError> {
        let frame = scrape_request_frame(event)?;
        let delivered = self.push(event.user_id, &frame.event, frame.data).await;
        if delivered > 0 {
            self.store
                .set_probe_event_status(&event.id, ProbeEventStatus::Sent, None, None)
                .await?;
        }
        debug!(event_id = event.id.as_str(), delivered, "scrape request dispatched");
        Ok(delivered)
    }

    /// Handle a probe's result callback.
    ///
    /// Verifies the event exists and belongs to the device's user, then
    /// marks it `completed` (returning the payload for the pipeline
    /// re-spawn) or `error`. Duplicate deliveries of a completed event
    /// replace identical content, which keeps the callback idempotent.
    pub async fn receive_result(
        &self,
        device: &ProbeDevice,
        payload: ScrapeResultPayload,
    ) -> Result<Option<ScrapeData>, LinkmapError> {
        let event = self
            .store
            .get_probe_event(&payload.event_id)
            .await?
            .ok_or_else(|| {
                LinkmapError::NotFound(format!("probe event {}", payload.event_id))
            })?;

        if event.user_id != device.user_id {
            return Err(LinkmapError::Unauthorized(
                "probe event belongs to a different user".to_string(),
            ));
        }

        if payload.success {
            let Some(data) = payload.data else {
                return Err(LinkmapError::Validation(
                    "successful result is missing scrape data".to_string(),
                ));
            };
            let result_json = serde_json::to_string(&data)
                .map_err(|e| LinkmapError::Internal(format!("unserializable result: {e}")))?;
            self.store
                .set_probe_event_status(
                    &event.id,
                    ProbeEventStatus::Completed,
                    Some(result_json),
                    None,
                )
                .await?;
            info!(event_id = event.id.as_str(), link_id = event.link_id, "probe result received");
            Ok(Some(data))
        } else {
            let message = payload
                .error
                .unwrap_or_else(|| "probe reported failure".to_string());
            warn!(event_id = event.id.as_str(), error = message.as_str(), "probe reported error");
            self.store
                .set_probe_event_status(&event.id, ProbeEventStatus::Error, None, Some(message))
                .await?;
            Ok(None)
        }
    }

    /// Expire unanswered probe events older than the retention window and
    /// move their waiting links to `error`. Returns the expired count.
    pub async fn expire_stale_events(&self, retention: Duration) -> Result<usize, LinkmapError> {
        let cutoff = (chrono::Utc::now()
            - chrono::Duration::seconds(retention.as_secs() as i64))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();

        let expired = self.store.expire_probe_events_before(&cutoff).await?;
        for (event_id, link_id) in &expired {
            warn!(event_id = event_id.as_str(), link_id, "probe event expired");
            self.store
                .update_link(
                    *link_id,
                    LinkUpdate {
                        status: Some(linkmap_core::types::LinkStatus::Error),
                        error: Some(Some("probe result timed out".to_string())),
                        ..Default::default()
                    },
                )
                .await?;
        }
        Ok(expired.len())
    }
}

/// Build the `scrape_request` frame for an event.
fn scrape_request_frame(event: &ProbeEvent) -> Result<SseFrame, LinkmapError> {
    let body = ScrapeRequestEvent {
        event_id: event.id.clone(),
        url: event.url.clone(),
        url_type: event.url_kind,
        link_id: event.link_id,
        created_at: event.created_at.clone(),
    };
    let data = serde_json::to_string(&body)
        .map_err(|e| LinkmapError::Internal(format!("unserializable scrape request: {e}")))?;
    Ok(SseFrame {
        event: "scrape_request".to_string(),
        data,
    })
}

/// A live subscription: a stream of frames plus cleanup on drop.
pub struct Subscription {
    rx: mpsc::Receiver<SseFrame>,
    user_id: i64,
    sink_id: String,
    sinks: SinkMap,
    heartbeat: JoinHandle<()>,
}

impl Subscription {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Receive the next frame (test and agent-loop convenience).
    pub async fn recv(&mut self) -> Option<SseFrame> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = SseFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.heartbeat.abort();
        let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(user_sinks) = sinks.get_mut(&self.user_id) {
            user_sinks.retain(|sink| sink.id != self.sink_id);
            if user_sinks.is_empty() {
                sinks.remove(&self.user_id);
            }
        }
        debug!(user_id = self.user_id, sink = self.sink_id.as_str(), "probe unsubscribed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkmap_core::types::UrlKind;

    async fn setup() -> (Arc<Store>, ProbeBridge, i64, i64) {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let user_id = store.create_user("tg-1", None).await.unwrap();
        let (link_id, _) = store
            .upsert_link(user_id, "https://twitter.com/a/status/1")
            .await
            .unwrap();
        let bridge = ProbeBridge::new(store.clone());
        (store, bridge, user_id, link_id)
    }

    async fn make_event(store: &Store, id: &str, user_id: i64, link_id: i64) -> ProbeEvent {
        store
            .create_probe_event(id, user_id, link_id, "https://twitter.com/a/status/1", UrlKind::Twitter)
            .await
            .unwrap();
        store.get_probe_event(id).await.unwrap().unwrap()
    }

    fn device(user_id: i64) -> ProbeDevice {
        ProbeDevice {
            id: "dev-1".into(),
            user_id,
            token: "lmp_test".into(),
            name: None,
            last_seen_at: None,
            created_at: "2026-03-01T00:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn subscribe_replays_pending_in_order() {
        let (store, bridge, user_id, link_id) = setup().await;
        make_event(&store, "ev-1", user_id, link_id).await;
        make_event(&store, "ev-2", user_id, link_id).await;

        let mut sub = bridge.subscribe(user_id).await.unwrap();

        let first = sub.recv().await.unwrap();
        assert_eq!(first.event, "scrape_request");
        let body: ScrapeRequestEvent = serde_json::from_str(&first.data).unwrap();
        assert_eq!(body.event_id, "ev-1");
        assert_eq!(body.link_id, link_id);
        assert_eq!(body.url_type, UrlKind::Twitter);

        let second = sub.recv().await.unwrap();
        let body: ScrapeRequestEvent = serde_json::from_str(&second.data).unwrap();
        assert_eq!(body.event_id, "ev-2");

        // Both events are now marked sent and will not replay again.
        let ev = store.get_probe_event("ev-1").await.unwrap().unwrap();
        assert_eq!(ev.status, ProbeEventStatus::Sent);
        assert!(ev.sent_at.is_some());

        let mut second_sub = bridge.subscribe(user_id).await.unwrap();
        drop(sub);
        // Nothing pending: only heartbeats would arrive, so an immediate
        // try_recv on the channel must find it empty.
        assert!(
            tokio::time::timeout(Duration::from_millis(50), second_sub.recv())
                .await
                .is_err(),
            "sent events must not be replayed"
        );
    }

    #[tokio::test]
    async fn push_reaches_every_sink_for_the_user() {
        let (_store, bridge, user_id, _link_id) = setup().await;
        let mut sub_a = bridge.subscribe(user_id).await.unwrap();
        let mut sub_b = bridge.subscribe(user_id).await.unwrap();
        assert_eq!(bridge.active_subscriptions(user_id), 2);

        let delivered = bridge.push(user_id, "ping", "{}".to_string()).await;
        assert_eq!(delivered, 2);

        assert_eq!(sub_a.recv().await.unwrap().event, "ping");
        assert_eq!(sub_b.recv().await.unwrap().event, "ping");
    }

    #[tokio::test]
    async fn push_to_user_without_sinks_is_zero() {
        let (_store, bridge, user_id, _link_id) = setup().await;
        let delivered = bridge.push(user_id, "ping", "{}".to_string()).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn dispatch_marks_sent_only_when_delivered() {
        let (store, bridge, user_id, link_id) = setup().await;
        let event = make_event(&store, "ev-1", user_id, link_id).await;

        // No subscriber: the event stays pending for replay.
        let delivered = bridge.dispatch_scrape_request(&event).await.unwrap();
        assert_eq!(delivered, 0);
        let ev = store.get_probe_event("ev-1").await.unwrap().unwrap();
        assert_eq!(ev.status, ProbeEventStatus::Pending);

        // With a subscriber it is delivered and marked sent.
        let mut sub = bridge.subscribe(user_id).await.unwrap();
        // Drain the replay of the still-pending event.
        sub.recv().await.unwrap();
        let event = store.get_probe_event("ev-1").await.unwrap().unwrap();
        assert_eq!(event.status, ProbeEventStatus::Sent);
    }

    #[tokio::test]
    async fn drop_unsubscribes() {
        let (_store, bridge, user_id, _link_id) = setup().await;
        let sub = bridge.subscribe(user_id).await.unwrap();
        assert_eq!(bridge.active_subscriptions(user_id), 1);
        drop(sub);
        assert_eq!(bridge.active_subscriptions(user_id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_pings_every_thirty_seconds() {
        let (_store, bridge, user_id, _link_id) = setup().await;
        let mut sub = bridge.subscribe(user_id).await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        let frame = sub.recv().await.unwrap();
        assert_eq!(frame.event, "ping");
        assert_eq!(frame.data, "{}");
    }

    #[tokio::test]
    async fn receive_result_success_completes_event() {
        let (store, bridge, user_id, link_id) = setup().await;
        make_event(&store, "ev-1", user_id, link_id).await;

        let data = bridge
            .receive_result(
                &device(user_id),
                ScrapeResultPayload {
                    event_id: "ev-1".into(),
                    success: true,
                    data: Some(ScrapeData {
                        markdown: "tweet text".into(),
                        ..Default::default()
                    }),
                    error: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(data.unwrap().markdown, "tweet text");

        let ev = store.get_probe_event("ev-1").await.unwrap().unwrap();
        assert_eq!(ev.status, ProbeEventStatus::Completed);
        assert!(ev.result.is_some());
        assert!(ev.completed_at.is_some());
    }

    #[tokio::test]
    async fn receive_result_failure_marks_error() {
        let (store, bridge, user_id, link_id) = setup().await;
        make_event(&store, "ev-1", user_id, link_id).await;

        let data = bridge
            .receive_result(
                &device(user_id),
                ScrapeResultPayload {
                    event_id: "ev-1".into(),
                    success: false,
                    data: None,
                    error: Some("login wall".into()),
                },
            )
            .await
            .unwrap();
        assert!(data.is_none());

        let ev = store.get_probe_event("ev-1").await.unwrap().unwrap();
        assert_eq!(ev.status, ProbeEventStatus::Error);
        assert_eq!(ev.error.as_deref(), Some("login wall"));
    }

    #[tokio::test]
    async fn receive_result_rejects_foreign_and_unknown_events() {
        let (store, bridge, user_id, link_id) = setup().await;
        make_event(&store, "ev-1", user_id, link_id).await;

        let other_user = store.create_user("tg-2", None).await.unwrap();
        let payload = ScrapeResultPayload {
            event_id: "ev-1".into(),
            success: true,
            data: Some(ScrapeData::default()),
            error: None,
        };
        let err = bridge
            .receive_result(&device(other_user), payload.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, LinkmapError::Unauthorized(_)));

        let err = bridge
            .receive_result(
                &device(user_id),
                ScrapeResultPayload {
                    event_id: "ev-missing".into(),
                    ..payload
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LinkmapError::NotFound(_)));
    }

    #[tokio::test]
    async fn expire_stale_events_moves_links_to_error() {
        let (store, bridge, user_id, link_id) = setup().await;
        make_event(&store, "ev-1", user_id, link_id).await;
        store
            .update_link(
                link_id,
                LinkUpdate {
                    status: Some(linkmap_core::types::LinkStatus::WaitingProbe),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Zero retention expires everything created so far.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let expired = bridge.expire_stale_events(Duration::ZERO).await.unwrap();
        assert_eq!(expired, 1);

        let link = store.get_link(link_id).await.unwrap().unwrap();
        assert_eq!(link.status, linkmap_core::types::LinkStatus::Error);
        assert_eq!(link.error.as_deref(), Some("probe result timed out"));
    }
}
