// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the linkmap workspace.

use thiserror::Error;

/// The primary error type used across all linkmap crates.
#[derive(Debug, Error)]
pub enum LinkmapError {
    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (connection, query failure). Retryable.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Integrity violation from the store (unique/foreign key). Fatal for
    /// the operation that triggered it.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// LLM provider errors (API failure, rate limits, parse failures).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Scraper errors (extractor failure, navigation errors, subprocess
    /// failures). The message text is matched against the permanent-error
    /// list by the pipeline.
    #[error("scrape error: {message}")]
    Scrape {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Bad input at an API boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
