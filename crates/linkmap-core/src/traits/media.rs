// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image download + OCR helper trait.

use async_trait::async_trait;

use crate::error::LinkmapError;
use crate::types::MediaItem;

/// Adapter for the image downloader / OCR helper.
///
/// Failures here are always non-fatal to the pipeline: the scrape step logs
/// and proceeds without OCR text.
#[async_trait]
pub trait MediaOcr: Send + Sync {
    /// Download the given media items and return any recognized text,
    /// one entry per item that yielded text.
    async fn extract_text(&self, media: &[MediaItem]) -> Result<Vec<String>, LinkmapError>;
}
