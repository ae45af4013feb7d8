// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full-journey end-to-end test: a Twitter link travels from submission
//! through probe suspension, enrollment, local scrape, and back to
//! `analyzed`: entirely over the HTTP surface.

use std::time::Instant;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use futures::StreamExt;
use linkmap_core::types::LinkStatus;
use linkmap_gateway::{router, AppState, SessionAuth};
use linkmap_test_utils::TestHarness;
use serde_json::{json, Value};
use tower::ServiceExt;

fn state_for(harness: &TestHarness) -> AppState {
    AppState {
        store: harness.store.clone(),
        pipeline: harness.pipeline.clone(),
        bridge: harness.bridge.clone(),
        session: SessionAuth::new("e2e-secret"),
        web_base_url: "http://coordinator.test".to_string(),
        start_time: Instant::now(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn twitter_link_full_journey() {
    let harness = TestHarness::new().await;
    let state = state_for(&harness);
    let cookie = format!("session={}", state.session.sign(harness.user_id));
    let app = router(state);

    // 1. Submit a Twitter URL; the pipeline suspends on the probe.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/links")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "url": "https://twitter.com/rustlang/status/1" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    harness.drain().await;

    let link = harness
        .store
        .get_link_by_url(harness.user_id, "https://twitter.com/rustlang/status/1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.status, LinkStatus::WaitingProbe);

    // 2. A probe enrolls through the device-code flow.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/device")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    let grant = body_json(response).await;
    let device_code = grant["device_code"].as_str().unwrap().to_string();
    let user_code = grant["user_code"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/device/authorize")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("user_code={user_code}")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "device_code": device_code }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(token.starts_with("lmp_"));

    // 3. The probe subscribes and receives the pending scrape request.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/probe/subscribe_events")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut stream = response.into_body().into_data_stream();
    let chunk = stream.next().await.unwrap().unwrap();
    let text = String::from_utf8(chunk.to_vec()).unwrap();
    assert!(text.contains("event: scrape_request"));
    let data_line = text
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .expect("frame carries a data line");
    let request: Value = serde_json::from_str(data_line).unwrap();
    let event_id = request["event_id"].as_str().unwrap().to_string();
    assert_eq!(request["link_id"].as_i64().unwrap(), link.id);
    drop(stream);

    // 4. The probe posts its locally scraped result.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/probe/receive_result")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "event_id": event_id,
                        "success": true,
                        "data": {
                            "title": "Announcing Rust",
                            "markdown": "We are happy to announce...",
                            "og_site_name": "Twitter"
                        }
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 5. The re-spawned pipeline drives the link to analyzed.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    harness.drain().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/links/{}", link.id))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await;
    assert_eq!(detail["status"], "analyzed");
    assert_eq!(detail["title"], "Announcing Rust");
    assert!(detail["summary"].is_string());
    assert!(!detail["tags"].as_array().unwrap().is_empty());

    // 6. Deletion removes the link and everything referencing it.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/links/{}", link.id))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(harness.store.get_link(link.id).await.unwrap().is_none());
    assert!(harness
        .store
        .get_probe_event(&event_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn analyzed_links_always_carry_summary_tags_and_vector() {
    let harness = TestHarness::new().await;

    for i in 0..3 {
        harness.submit(&format!("https://example.com/{i}")).await;
    }
    harness.drain().await;

    let analyzed = harness.store.list_analyzed(harness.user_id).await.unwrap();
    assert_eq!(analyzed.len(), 3);
    for link in analyzed {
        assert_eq!(link.status, LinkStatus::Analyzed);
        assert!(link.summary.is_some(), "analyzed link without summary");
        assert!(
            link.tags.map(|tags| !tags.is_empty()).unwrap_or(false),
            "analyzed link without tags"
        );
        assert!(
            link.summary_vector.map(|v| !v.is_empty()).unwrap_or(false),
            "analyzed link without vector"
        );
    }
}
