// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP clients for the scraping sidecar.
//!
//! The sidecar hosts the JS-capable headless browser plus the content
//! extractor, and the image downloader with OCR. Both are external
//! collaborators; these clients are their only coordinator-side surface.

pub mod ocr;
pub mod scraper;

pub use ocr::OcrClient;
pub use scraper::ScraperClient;
