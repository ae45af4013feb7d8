// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Link, retry, search, and probe-status handlers.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use linkmap_core::LinkmapError;
use linkmap_pipeline::ProcessLinkParams;
use linkmap_storage::Link;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::SessionUser;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Request body for POST /api/links.
#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub url: String,
}

/// Response body for POST /api/links.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkResponse {
    pub task_id: i64,
    pub url: String,
    pub status: String,
}

/// One row in GET /api/links.
#[derive(Debug, Serialize)]
pub struct LinkSummary {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub status: String,
    pub created_at: String,
}

/// Full link detail with parsed tag and relation lists.
#[derive(Debug, Serialize)]
pub struct LinkDetail {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site_name: Option<String>,
    pub summary: Option<String>,
    pub insight: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub error: Option<String>,
    pub related: Vec<RelatedLink>,
    pub created_at: String,
    pub updated_at: String,
}

/// One related link in the detail view.
#[derive(Debug, Serialize)]
pub struct RelatedLink {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub score: f64,
}

/// Response body for DELETE /api/links/:id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteLinkResponse {
    pub message: String,
    pub link_id: i64,
    pub url: String,
    pub related_links_updated: usize,
}

/// Response body for POST /api/retry.
#[derive(Debug, Serialize)]
pub struct RetryAllResponse {
    pub message: String,
    pub ids: Vec<i64>,
}

/// Response body for POST /api/retry/:id and /api/links/:id/refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryOneResponse {
    pub task_id: i64,
    pub link_id: i64,
    pub status: String,
}

/// One hit in GET /api/search.
#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
}

/// Response body for GET /api/probe/status.
#[derive(Debug, Serialize)]
pub struct ProbeStatusResponse {
    pub devices: Vec<ProbeDeviceInfo>,
    pub pending_events_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ProbeDeviceInfo {
    pub id: String,
    pub name: Option<String>,
    pub last_seen_at: Option<String>,
    pub created_at: String,
}

/// Health response for the unauthenticated endpoint.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn validate_url(url: &str) -> Result<(), LinkmapError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| LinkmapError::Validation(format!("malformed url: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(LinkmapError::Validation(format!(
            "unsupported url scheme '{other}'"
        ))),
    }
}

/// Fetch a link and enforce per-user scoping. Foreign links 404 rather
/// than 403 to avoid existence leaks.
async fn owned_link(state: &AppState, user_id: i64, link_id: i64) -> Result<Link, ApiError> {
    let link = state
        .store
        .get_link(link_id)
        .await?
        .filter(|link| link.user_id == user_id)
        .ok_or_else(|| ApiError(LinkmapError::NotFound(format!("link {link_id}"))))?;
    Ok(link)
}

/// POST /api/links: submit a URL; spawn-and-return.
pub async fn create_link(
    State(state): State<AppState>,
    Extension(SessionUser(user_id)): Extension<SessionUser>,
    Json(body): Json<CreateLinkRequest>,
) -> ApiResult<Json<CreateLinkResponse>> {
    validate_url(&body.url)?;

    let task_id = state
        .pipeline
        .spawn_process_link(ProcessLinkParams {
            user_id,
            url: body.url.clone(),
            link_id: None,
            scrape_data: None,
        })
        .await?;
    info!(user_id, url = body.url.as_str(), task_id, "link submitted");

    Ok(Json(CreateLinkResponse {
        task_id,
        url: body.url,
        status: "queued".to_string(),
    }))
}

/// GET /api/links: recent links, optionally paginated.
pub async fn list_links(
    State(state): State<AppState>,
    Extension(SessionUser(user_id)): Extension<SessionUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<LinkSummary>>> {
    let limit = query.limit.unwrap_or(20).min(200);
    let links = match query.offset {
        Some(offset) => state.store.list_paginated(user_id, limit, offset).await?,
        None => state.store.list_recent(user_id, limit).await?,
    };
    Ok(Json(
        links
            .into_iter()
            .map(|link| LinkSummary {
                id: link.id,
                url: link.url,
                title: link.title,
                status: link.status.as_str().to_string(),
                created_at: link.created_at,
            })
            .collect(),
    ))
}

/// GET /api/links/:id: detail with parsed tag/relation lists.
pub async fn get_link_detail(
    State(state): State<AppState>,
    Extension(SessionUser(user_id)): Extension<SessionUser>,
    Path(link_id): Path<i64>,
) -> ApiResult<Json<LinkDetail>> {
    let link = owned_link(&state, user_id, link_id).await?;

    let mut related = Vec::new();
    for (other_id, score) in state.store.get_relations(link.id).await? {
        if let Some(other) = state.store.get_link(other_id).await? {
            related.push(RelatedLink {
                id: other.id,
                url: other.url,
                title: other.title,
                score,
            });
        }
    }

    Ok(Json(LinkDetail {
        id: link.id,
        url: link.url,
        title: link.title,
        description: link.description,
        image: link.image,
        site_name: link.site_name,
        summary: link.summary,
        insight: link.insight,
        tags: link.tags.unwrap_or_default(),
        status: link.status.as_str().to_string(),
        error: link.error,
        related,
        created_at: link.created_at,
        updated_at: link.updated_at,
    }))
}

/// DELETE /api/links/:id: deletion orchestration.
///
/// Scrubs relation rows and remote caches first, then removes the row
/// (probe events cascade via FK).
pub async fn delete_link(
    State(state): State<AppState>,
    Extension(SessionUser(user_id)): Extension<SessionUser>,
    Path(link_id): Path<i64>,
) -> ApiResult<Json<DeleteLinkResponse>> {
    let link = owned_link(&state, user_id, link_id).await?;

    let related_links_updated = state.store.remove_link_from_relations(link.id).await?;
    state.store.delete_link(link.id).await?;
    info!(user_id, link_id, related_links_updated, "link deleted");

    Ok(Json(DeleteLinkResponse {
        message: "link deleted".to_string(),
        link_id: link.id,
        url: link.url,
        related_links_updated,
    }))
}

/// POST /api/retry: re-run every failed link in the background.
pub async fn retry_failed(
    State(state): State<AppState>,
    Extension(SessionUser(user_id)): Extension<SessionUser>,
) -> ApiResult<Json<RetryAllResponse>> {
    let failed = state.store.list_failed(user_id).await?;
    let mut ids = Vec::with_capacity(failed.len());
    for link in failed {
        state
            .pipeline
            .spawn_process_link(ProcessLinkParams {
                user_id,
                url: link.url.clone(),
                link_id: Some(link.id),
                scrape_data: None,
            })
            .await?;
        ids.push(link.id);
    }
    info!(user_id, count = ids.len(), "failed links queued for retry");

    Ok(Json(RetryAllResponse {
        message: format!("{} links queued for retry", ids.len()),
        ids,
    }))
}

/// POST /api/retry/:id: re-run one link.
pub async fn retry_one(
    State(state): State<AppState>,
    Extension(SessionUser(user_id)): Extension<SessionUser>,
    Path(link_id): Path<i64>,
) -> ApiResult<Json<RetryOneResponse>> {
    let link = owned_link(&state, user_id, link_id).await?;

    let task_id = state
        .pipeline
        .spawn_process_link(ProcessLinkParams {
            user_id,
            url: link.url,
            link_id: Some(link.id),
            scrape_data: None,
        })
        .await?;

    Ok(Json(RetryOneResponse {
        task_id,
        link_id: link.id,
        status: "queued".to_string(),
    }))
}

/// POST /api/links/:id/refresh: re-run the back half of the pipeline.
pub async fn refresh_link(
    State(state): State<AppState>,
    Extension(SessionUser(user_id)): Extension<SessionUser>,
    Path(link_id): Path<i64>,
) -> ApiResult<Json<RetryOneResponse>> {
    let link = owned_link(&state, user_id, link_id).await?;
    let task_id = state.pipeline.spawn_refresh_related(link.id).await?;

    Ok(Json(RetryOneResponse {
        task_id,
        link_id: link.id,
        status: "queued".to_string(),
    }))
}

/// GET /api/search: BM25 over title, summary, and markdown.
pub async fn search(
    State(state): State<AppState>,
    Extension(SessionUser(user_id)): Extension<SessionUser>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<SearchHit>>> {
    if query.q.trim().is_empty() {
        return Err(ApiError(LinkmapError::Validation("empty query".into())));
    }
    let limit = query.limit.unwrap_or(20).min(100);

    let ids = state.store.bm25_search(&query.q, user_id, limit).await?;
    let mut hits = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(link) = state.store.get_link(id).await? {
            hits.push(SearchHit {
                id: link.id,
                url: link.url,
                title: link.title,
            });
        }
    }
    Ok(Json(hits))
}

/// GET /api/probe/status: the user's devices and outstanding events.
pub async fn probe_status(
    State(state): State<AppState>,
    Extension(SessionUser(user_id)): Extension<SessionUser>,
) -> ApiResult<Json<ProbeStatusResponse>> {
    let devices = state
        .store
        .list_probe_devices(user_id)
        .await?
        .into_iter()
        .map(|device| ProbeDeviceInfo {
            id: device.id,
            name: device.name,
            last_seen_at: device.last_seen_at,
            created_at: device.created_at,
        })
        .collect();
    let pending_events_count = state.store.count_pending_probe_events(user_id).await?;

    Ok(Json(ProbeStatusResponse {
        devices,
        pending_events_count,
    }))
}

/// GET /health: unauthenticated liveness for systemd and the status CLI.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
