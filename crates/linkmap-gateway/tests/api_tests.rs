// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission API contract tests over the in-process router.

use std::time::Instant;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use linkmap_core::types::UrlKind;
use linkmap_gateway::{router, AppState, SessionAuth};
use linkmap_test_utils::TestHarness;
use serde_json::{json, Value};
use tower::ServiceExt;

fn state_for(harness: &TestHarness) -> AppState {
    AppState {
        store: harness.store.clone(),
        pipeline: harness.pipeline.clone(),
        bridge: harness.bridge.clone(),
        session: SessionAuth::new("test-signing-secret"),
        web_base_url: "http://coordinator.test".to_string(),
        start_time: Instant::now(),
    }
}

fn session_cookie(state: &AppState, user_id: i64) -> String {
    format!("session={}", state.session.sign(user_id))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn submit_and_drain(harness: &TestHarness, app: &Router, cookie: &str, url: &str) -> i64 {
    let response = app
        .clone()
        .oneshot(post_json("/api/links", Some(cookie), json!({ "url": url })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    harness.drain().await;
    harness
        .store
        .get_link_by_url(harness.user_id, url)
        .await
        .unwrap()
        .unwrap()
        .id
}

#[tokio::test]
async fn session_routes_reject_missing_or_bad_cookies() {
    let harness = TestHarness::new().await;
    let app = router(state_for(&harness));

    let response = app.clone().oneshot(get("/api/links", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get("/api/links", Some("session=42.deadbeef")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submit_queue_and_list() {
    let harness = TestHarness::new().await;
    let state = state_for(&harness);
    let cookie = session_cookie(&state, harness.user_id);
    let app = router(state);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/links",
            Some(&cookie),
            json!({ "url": "https://example.com/a" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "queued");
    assert_eq!(body["url"], "https://example.com/a");
    assert!(body["taskId"].as_i64().unwrap() > 0);

    harness.drain().await;

    let response = app
        .clone()
        .oneshot(get("/api/links?limit=10", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["url"], "https://example.com/a");
    assert_eq!(rows[0]["status"], "analyzed");
    assert!(rows[0]["created_at"].is_string());
}

#[tokio::test]
async fn malformed_url_is_rejected() {
    let harness = TestHarness::new().await;
    let state = state_for(&harness);
    let cookie = session_cookie(&state, harness.user_id);
    let app = router(state);

    let response = app
        .clone()
        .oneshot(post_json("/api/links", Some(&cookie), json!({ "url": "not a url" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/links",
            Some(&cookie),
            json!({ "url": "ftp://example.com/x" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn link_detail_includes_tags_and_relations() {
    let harness = TestHarness::new().await;
    let state = state_for(&harness);
    let cookie = session_cookie(&state, harness.user_id);
    let app = router(state);

    harness.embedder.add_vector(vec![1.0, 0.0, 0.0, 0.0]).await;
    harness
        .provider
        .add_response(r#"{"summary":"s-a","tags":["alpha","beta"]}"#)
        .await;
    harness.provider.add_response("insight-a").await;
    let a = submit_and_drain(&harness, &app, &cookie, "https://example.com/a").await;

    // cos 0.75 -> score 0.80, above threshold.
    harness
        .embedder
        .add_vector(vec![0.75, (0.4375f32).sqrt(), 0.0, 0.0])
        .await;
    let b = submit_and_drain(&harness, &app, &cookie, "https://example.com/b").await;

    let response = app
        .clone()
        .oneshot(get(&format!("/api/links/{a}"), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["summary"], "s-a");
    assert_eq!(body["insight"], "insight-a");
    assert_eq!(body["tags"], json!(["alpha", "beta"]));
    let related = body["related"].as_array().unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0]["id"].as_i64().unwrap(), b);
    assert!((related[0]["score"].as_f64().unwrap() - 0.80).abs() < f64::EPSILON);
}

#[tokio::test]
async fn foreign_links_are_invisible() {
    let harness = TestHarness::new().await;
    let state = state_for(&harness);
    let other_user = harness.store.create_user("tg-other", None).await.unwrap();
    let (foreign_link, _) = harness
        .store
        .upsert_link(other_user, "https://example.com/theirs")
        .await
        .unwrap();
    let cookie = session_cookie(&state, harness.user_id);
    let app = router(state);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/links/{foreign_link}"), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/links/{foreign_link}"))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_cascades_and_reports_scrub_count() {
    let harness = TestHarness::new().await;
    let state = state_for(&harness);
    let cookie = session_cookie(&state, harness.user_id);
    let app = router(state);

    // B and C each hold an outgoing edge to A, so both caches mention A.
    let (a, _) = harness.store.upsert_link(harness.user_id, "https://a").await.unwrap();
    let (b, _) = harness.store.upsert_link(harness.user_id, "https://b").await.unwrap();
    let (c, _) = harness.store.upsert_link(harness.user_id, "https://c").await.unwrap();
    harness.store.save_relations(b, vec![(a, 0.8)]).await.unwrap();
    harness.store.save_relations(c, vec![(a, 0.7)]).await.unwrap();

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/links/{a}"))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["linkId"].as_i64().unwrap(), a);
    assert_eq!(body["relatedLinksUpdated"].as_i64().unwrap(), 2);

    assert!(harness.store.get_link(a).await.unwrap().is_none());
    assert!(harness.store.get_relations(b).await.unwrap().is_empty());
    assert!(harness.store.get_relations(c).await.unwrap().is_empty());
}

#[tokio::test]
async fn retry_failed_requeues_error_links() {
    let harness = TestHarness::new().await;
    let state = state_for(&harness);
    let cookie = session_cookie(&state, harness.user_id);
    let app = router(state);

    harness.scraper.add_error("Download is starting").await;
    let link_id = {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/links",
                Some(&cookie),
                json!({ "url": "https://example.com/file.zip" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        harness.drain().await;
        harness
            .store
            .get_link_by_url(harness.user_id, "https://example.com/file.zip")
            .await
            .unwrap()
            .unwrap()
            .id
    };

    let response = app
        .clone()
        .oneshot(post_json("/api/retry", Some(&cookie), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ids"], json!([link_id]));

    // This time the scraper serves a real page; the retry succeeds.
    harness.drain().await;
    let link = harness.store.get_link(link_id).await.unwrap().unwrap();
    assert_eq!(link.status, linkmap_core::types::LinkStatus::Analyzed);
}

#[tokio::test]
async fn search_finds_links_by_content() {
    let harness = TestHarness::new().await;
    let state = state_for(&harness);
    let cookie = session_cookie(&state, harness.user_id);
    let app = router(state);

    harness
        .scraper
        .add_page(linkmap_core::types::ScrapeData {
            title: Some("Cooperative scheduling in async Rust".into()),
            markdown: "How executors poll futures.".into(),
            ..Default::default()
        })
        .await;
    let id = submit_and_drain(&harness, &app, &cookie, "https://example.com/sched").await;

    let response = app
        .clone()
        .oneshot(get("/api/search?q=scheduling", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let hits = body.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"].as_i64().unwrap(), id);

    let response = app
        .clone()
        .oneshot(get("/api/search?q=", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn device_enrollment_over_http() {
    let harness = TestHarness::new().await;
    let state = state_for(&harness);
    let cookie = session_cookie(&state, harness.user_id);
    let app = router(state);

    // Unauthenticated initiation.
    let response = app
        .clone()
        .oneshot(post_json("/api/auth/device", None, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let grant = body_json(response).await;
    let device_code = grant["device_code"].as_str().unwrap().to_string();
    let user_code = grant["user_code"].as_str().unwrap().to_string();
    assert_eq!(grant["expires_in"].as_u64().unwrap(), 900);
    assert_eq!(grant["interval"].as_u64().unwrap(), 5);
    assert_eq!(user_code.len(), 9);
    assert_eq!(&user_code[4..5], "-");
    for c in user_code.replace('-', "").chars() {
        assert!("ABCDEFGHJKLMNPQRSTUVWXYZ23456789".contains(c), "bad char {c}");
    }

    // Pending before authorization.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/token",
            None,
            json!({ "device_code": device_code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "authorization_pending");

    // The user authorizes through the verification form.
    let request = Request::builder()
        .method("POST")
        .uri("/auth/device/authorize")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("user_code={user_code}")))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The next poll issues an lmp_ bearer token.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/token",
            None,
            json!({ "device_code": device_code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["access_token"].as_str().unwrap();
    assert!(token.starts_with("lmp_"));
    assert_eq!(token.len(), 36);
    assert_eq!(body["user_id"].as_i64().unwrap(), harness.user_id);

    // Unknown codes are rejected.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/token",
            None,
            json!({ "device_code": "0000000000000000" }),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["error"], "invalid_device_code");

    // The device now shows in probe status.
    let response = app
        .clone()
        .oneshot(get("/api/probe/status", Some(&cookie)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["devices"].as_array().unwrap().len(), 1);
    assert_eq!(body["pending_events_count"].as_i64().unwrap(), 0);
}

#[tokio::test]
async fn probe_routes_require_bearer() {
    let harness = TestHarness::new().await;
    let app = router(state_for(&harness));

    let response = app
        .clone()
        .oneshot(get("/api/probe/subscribe_events", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("GET")
        .uri("/api/probe/subscribe_events")
        .header(header::AUTHORIZATION, "Bearer lmp_wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn subscribe_stream_replays_pending_events() {
    let harness = TestHarness::new().await;
    let app = router(state_for(&harness));

    // A suspended Twitter link leaves a pending probe event behind.
    harness.submit("https://twitter.com/x/status/123").await;
    harness.drain().await;

    harness
        .store
        .create_probe_device("dev-1", harness.user_id, "lmp_streamtoken", None)
        .await
        .unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/api/probe/subscribe_events")
        .header(header::AUTHORIZATION, "Bearer lmp_streamtoken")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let chunk = body.next().await.unwrap().unwrap();
    let text = String::from_utf8(chunk.to_vec()).unwrap();
    assert!(text.contains("event: scrape_request"), "got: {text}");
    assert!(text.contains("\"url_type\":\"twitter\""));
}

#[tokio::test]
async fn receive_result_completes_the_event() {
    let harness = TestHarness::new().await;
    let app = router(state_for(&harness));

    harness.submit("https://twitter.com/x/status/9").await;
    harness.drain().await;

    let link = harness
        .store
        .get_link_by_url(harness.user_id, "https://twitter.com/x/status/9")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.status, linkmap_core::types::LinkStatus::WaitingProbe);

    let event = harness
        .store
        .list_pending_probe_events(harness.user_id)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(event.url_kind, UrlKind::Twitter);

    harness
        .store
        .create_probe_device("dev-1", harness.user_id, "lmp_resulttoken", None)
        .await
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/probe/receive_result")
        .header(header::AUTHORIZATION, "Bearer lmp_resulttoken")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "event_id": event.id,
                "success": true,
                "data": { "title": "A Tweet", "markdown": "tweet body" }
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ok"], true);

    let event = harness.store.get_probe_event(&event.id).await.unwrap().unwrap();
    assert_eq!(
        event.status,
        linkmap_core::types::ProbeEventStatus::Completed
    );

    // The re-spawn happens asynchronously; give it a beat, then drain.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    harness.drain().await;
    let link = harness.store.get_link(link.id).await.unwrap().unwrap();
    assert_eq!(link.status, linkmap_core::types::LinkStatus::Analyzed);
}
