// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock article scraper and OCR helper.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use linkmap_core::types::{MediaItem, ScrapeData};
use linkmap_core::{ArticleScraper, LinkmapError, MediaOcr};
use tokio::sync::Mutex;

/// A mock scraper that pops scripted pages (or errors) per scrape call.
///
/// With an empty queue it serves a minimal default page. Scraped URLs are
/// recorded for assertions.
pub struct MockScraper {
    results: Arc<Mutex<VecDeque<Result<ScrapeData, String>>>>,
    scraped_urls: Arc<Mutex<Vec<String>>>,
}

impl MockScraper {
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(VecDeque::new())),
            scraped_urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful scrape result.
    pub async fn add_page(&self, data: ScrapeData) {
        self.results.lock().await.push_back(Ok(data));
    }

    /// Queue a scrape failure with the extractor's message text.
    pub async fn add_error(&self, message: impl Into<String>) {
        self.results.lock().await.push_back(Err(message.into()));
    }

    /// Every URL scraped so far, in order.
    pub async fn scraped_urls(&self) -> Vec<String> {
        self.scraped_urls.lock().await.clone()
    }

    fn default_page() -> ScrapeData {
        ScrapeData {
            title: Some("Mock Page".to_string()),
            markdown: "Mock page content.".to_string(),
            og_site_name: Some("mock.example".to_string()),
            ..Default::default()
        }
    }
}

impl Default for MockScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleScraper for MockScraper {
    async fn scrape(&self, url: &str) -> Result<ScrapeData, LinkmapError> {
        self.scraped_urls.lock().await.push(url.to_string());
        match self.results.lock().await.pop_front() {
            Some(Ok(data)) => Ok(data),
            Some(Err(message)) => Err(LinkmapError::Scrape {
                message,
                source: None,
            }),
            None => Ok(Self::default_page()),
        }
    }
}

/// A mock OCR helper returning fixed texts, with optional failure.
pub struct MockOcr {
    texts: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockOcr {
    pub fn new() -> Self {
        Self {
            texts: Vec::new(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_texts(texts: Vec<String>) -> Self {
        Self {
            texts,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call errors; the pipeline must shrug it off.
    pub fn failing() -> Self {
        Self {
            texts: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockOcr {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaOcr for MockOcr {
    async fn extract_text(&self, _media: &[MediaItem]) -> Result<Vec<String>, LinkmapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LinkmapError::Scrape {
                message: "ocr helper unavailable".to_string(),
                source: None,
            });
        }
        Ok(self.texts.clone())
    }
}
