// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the linkmap coordinator.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level linkmap configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LinkmapConfig {
    /// HTTP server bind settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Session-cookie and URL settings for the admission API.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Durable task runtime settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Pipeline tuning (related-links threshold, probe retention).
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Anthropic API settings (summaries and insights).
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Embedding service settings.
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    /// Article-extractor sidecar settings.
    #[serde(default)]
    pub scraper: ScraperConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3400
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "linkmap.db".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional log file path. `None` logs to stderr.
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Session-cookie verification and public URL configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC signing secret for session cookies. Required to serve any
    /// session-authenticated route.
    #[serde(default)]
    pub session_secret: Option<String>,

    /// Public base URL, used to build the device verification URI.
    #[serde(default = "default_web_base_url")]
    pub web_base_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: None,
            web_base_url: default_web_base_url(),
        }
    }
}

fn default_web_base_url() -> String {
    "http://127.0.0.1:3400".to_string()
}

/// Durable task runtime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Number of concurrent pipeline workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Claim lease duration in seconds. An expired lease returns the task
    /// to the queue without counting as a failed attempt.
    #[serde(default = "default_claim_timeout_secs")]
    pub claim_timeout_secs: u64,

    /// Worker poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            claim_timeout_secs: default_claim_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_workers() -> usize {
    2
}

fn default_claim_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Pipeline tuning configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Minimum score at which two links are considered related.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Hard cap on stored relations per link.
    #[serde(default = "default_max_relations")]
    pub max_relations: usize,

    /// Candidate count requested from the vector search.
    #[serde(default = "default_vector_search_k")]
    pub vector_search_k: usize,

    /// Hours before an unanswered probe event is expired and its link
    /// moved to `error`.
    #[serde(default = "default_probe_event_retention_hours")]
    pub probe_event_retention_hours: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_relations: default_max_relations(),
            vector_search_k: default_vector_search_k(),
            probe_event_retention_hours: default_probe_event_retention_hours(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.65
}

fn default_max_relations() -> usize {
    5
}

fn default_vector_search_k() -> usize {
    10
}

fn default_probe_event_retention_hours() -> u64 {
    24
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` requires an environment override.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for summaries and insights.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

/// Embedding service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingsConfig {
    /// Base URL of the embeddings endpoint.
    #[serde(default = "default_embeddings_endpoint")]
    pub endpoint: String,

    /// Optional bearer token for the embeddings endpoint.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Embedding model identifier.
    #[serde(default = "default_embeddings_model")]
    pub model: String,

    /// Dimensionality of the produced vectors.
    #[serde(default = "default_embeddings_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embeddings_endpoint(),
            api_key: None,
            model: default_embeddings_model(),
            dimensions: default_embeddings_dimensions(),
        }
    }
}

fn default_embeddings_endpoint() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

fn default_embeddings_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embeddings_dimensions() -> usize {
    1536
}

/// Article-extractor sidecar configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScraperConfig {
    /// Base URL of the extractor sidecar (headless browser + readability).
    #[serde(default = "default_scraper_endpoint")]
    pub endpoint: String,

    /// Per-scrape timeout in seconds.
    #[serde(default = "default_scrape_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            endpoint: default_scraper_endpoint(),
            timeout_secs: default_scrape_timeout_secs(),
        }
    }
}

fn default_scraper_endpoint() -> String {
    "http://127.0.0.1:3401".to_string()
}

fn default_scrape_timeout_secs() -> u64 {
    60
}
