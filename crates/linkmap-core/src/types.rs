// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the coordinator and the probe.
//!
//! Wire payloads (`ScrapeData`, the SSE event bodies, the result callback)
//! live here so the gateway, bridge, pipeline, and probe agent agree on a
//! single serde representation.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a link as it moves through the pipeline.
///
/// Transitions form a DAG: `pending -> {scraped, waiting_probe, error}`,
/// `waiting_probe -> pending` (probe result re-spawn), `scraped -> analyzed`.
/// The terminal states `analyzed` and `error` re-enter `pending` on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Pending,
    Scraped,
    Analyzed,
    Error,
    WaitingProbe,
}

impl LinkStatus {
    /// String form used in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Pending => "pending",
            LinkStatus::Scraped => "scraped",
            LinkStatus::Analyzed => "analyzed",
            LinkStatus::Error => "error",
            LinkStatus::WaitingProbe => "waiting_probe",
        }
    }

    /// Parse from the store's string form. Unknown values map to `Error`.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "pending" => LinkStatus::Pending,
            "scraped" => LinkStatus::Scraped,
            "analyzed" => LinkStatus::Analyzed,
            "waiting_probe" => LinkStatus::WaitingProbe,
            _ => LinkStatus::Error,
        }
    }
}

/// Lifecycle status of a probe event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProbeEventStatus {
    Pending,
    Sent,
    Completed,
    Error,
}

impl ProbeEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeEventStatus::Pending => "pending",
            ProbeEventStatus::Sent => "sent",
            ProbeEventStatus::Completed => "completed",
            ProbeEventStatus::Error => "error",
        }
    }

    pub fn from_str_value(s: &str) -> Self {
        match s {
            "pending" => ProbeEventStatus::Pending,
            "sent" => ProbeEventStatus::Sent,
            "completed" => ProbeEventStatus::Completed,
            _ => ProbeEventStatus::Error,
        }
    }
}

/// State of a durable task in the runtime's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Claimed,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Claimed => "claimed",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }

    pub fn from_str_value(s: &str) -> Self {
        match s {
            "queued" => TaskState::Queued,
            "claimed" => TaskState::Claimed,
            "completed" => TaskState::Completed,
            "cancelled" => TaskState::Cancelled,
            _ => TaskState::Failed,
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

/// Status of a device-code enrollment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceAuthStatus {
    Pending,
    Authorized,
    Expired,
}

impl DeviceAuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceAuthStatus::Pending => "pending",
            DeviceAuthStatus::Authorized => "authorized",
            DeviceAuthStatus::Expired => "expired",
        }
    }

    pub fn from_str_value(s: &str) -> Self {
        match s {
            "authorized" => DeviceAuthStatus::Authorized,
            "expired" => DeviceAuthStatus::Expired,
            _ => DeviceAuthStatus::Pending,
        }
    }
}

/// Which scrape path a URL takes: Twitter URLs require a probe with local
/// browser context; everything else is scraped coordinator-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlKind {
    Twitter,
    Web,
}

impl UrlKind {
    /// Classify a URL by host.
    pub fn classify(url: &str) -> Self {
        let host = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(url);
        let host = host.split('/').next().unwrap_or("");
        let host = host.strip_prefix("www.").unwrap_or(host);
        if host == "twitter.com" || host == "x.com" {
            UrlKind::Twitter
        } else {
            UrlKind::Web
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UrlKind::Twitter => "twitter",
            UrlKind::Web => "web",
        }
    }

    pub fn from_str_value(s: &str) -> Self {
        match s {
            "twitter" => UrlKind::Twitter,
            _ => UrlKind::Web,
        }
    }
}

/// A media item attached to a scrape result (images, video thumbnails).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    /// Media kind, e.g. "photo" or "video".
    #[serde(rename = "type")]
    pub media_type: String,
    /// Source URL of the media.
    pub url: String,
}

/// Scraped page content, produced either by the coordinator-side extractor
/// or by a probe and shipped through the result callback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeData {
    /// Page title, if the extractor found one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Main content as markdown.
    pub markdown: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_type: Option<String>,
    /// Media attached to the page (tweet images etc.), processed through
    /// the image/OCR helper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_media: Option<Vec<MediaItem>>,
}

/// Body of a `scrape_request` SSE event pushed to probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequestEvent {
    pub event_id: String,
    pub url: String,
    pub url_type: UrlKind,
    pub link_id: i64,
    pub created_at: String,
}

/// Result callback payload POSTed by a probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResultPayload {
    pub event_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ScrapeData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A request to the LLM provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Optional system prompt.
    pub system: Option<String>,
    /// User-turn prompt text.
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// A response from the LLM provider.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Concatenated text content.
    pub content: String,
    /// Model that produced the response.
    pub model: String,
}
