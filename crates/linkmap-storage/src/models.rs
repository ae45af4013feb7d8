// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! These types represent the rows stored in the SQLite database. Cross-
//! component wire types (scrape payloads, statuses) live in
//! `linkmap-core::types`; the row structs here reference them.

use linkmap_core::types::{DeviceAuthStatus, LinkStatus, ProbeEventStatus, TaskState, UrlKind};
use serde::{Deserialize, Serialize};

/// A registered user. Created on first contact through the chat adapter,
/// activated when an invite is consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// External chat identifier (unique).
    pub chat_id: String,
    pub display_name: Option<String>,
    /// "pending" or "active".
    pub status: String,
    pub invite_code: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// An ingested link with its scraped and LLM-derived fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub user_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site_name: Option<String>,
    pub og_type: Option<String>,
    /// Extracted page content as markdown.
    pub markdown: Option<String>,
    pub summary: Option<String>,
    pub insight: Option<String>,
    /// Ordered tag list, stored as a JSON array.
    pub tags: Option<Vec<String>>,
    /// Image descriptors (opaque JSON from the scrape).
    pub images: Option<serde_json::Value>,
    /// Cached ids of this link's outgoing relations.
    pub related_ids: Vec<i64>,
    /// Summary embedding, stored as an f32-LE BLOB.
    #[serde(skip)]
    pub summary_vector: Option<Vec<f32>>,
    pub status: LinkStatus,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update for a link. `None` fields are left untouched; the nested
/// `Option` on `error` distinguishes "clear" from "leave alone".
#[derive(Debug, Clone, Default)]
pub struct LinkUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site_name: Option<String>,
    pub og_type: Option<String>,
    pub markdown: Option<String>,
    pub summary: Option<String>,
    pub insight: Option<String>,
    pub tags: Option<Vec<String>>,
    pub images: Option<serde_json::Value>,
    pub summary_vector: Option<Vec<f32>>,
    pub status: Option<LinkStatus>,
    pub error: Option<Option<String>>,
}

/// A user-owned probe daemon, identified by its bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeDevice {
    pub id: String,
    pub user_id: i64,
    pub token: String,
    pub name: Option<String>,
    pub last_seen_at: Option<String>,
    pub created_at: String,
}

/// A unit of scrape work dispatched from coordinator to probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeEvent {
    pub id: String,
    pub user_id: i64,
    pub link_id: i64,
    pub url: String,
    pub url_kind: UrlKind,
    pub status: ProbeEventStatus,
    /// Result payload JSON (present when completed).
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub sent_at: Option<String>,
    pub completed_at: Option<String>,
}

/// A device-code enrollment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthRequest {
    pub device_code: String,
    pub user_code: String,
    pub user_id: Option<i64>,
    pub status: DeviceAuthStatus,
    pub expires_at: String,
    pub created_at: String,
}

/// A durable task row driven by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: i64,
    pub queue_name: String,
    pub kind: String,
    /// Parameters JSON, opaque to the store.
    pub params: String,
    pub status: TaskState,
    pub attempts: i32,
    pub max_attempts: i32,
    /// Retry strategy JSON, opaque to the store.
    pub retry_strategy: String,
    pub not_before: Option<String>,
    pub locked_until: Option<String>,
    pub last_error: Option<String>,
    pub result: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
