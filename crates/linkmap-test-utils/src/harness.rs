// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full-stack test harness.
//!
//! Assembles an in-memory store, the durable runtime, the probe bridge,
//! and the pipeline with mock collaborators, plus one test user. Tests
//! drive the queue deterministically with [`TestHarness::drain`].

use std::sync::Arc;

use linkmap_bridge::ProbeBridge;
use linkmap_pipeline::{Pipeline, PipelineSettings, ProcessLinkParams, QUEUE};
use linkmap_runtime::TaskRuntime;
use linkmap_storage::Store;

use crate::mock_embedder::MockEmbedder;
use crate::mock_provider::MockProvider;
use crate::mock_scraper::{MockOcr, MockScraper};

/// A complete coordinator stack over mocks and a temp database.
pub struct TestHarness {
    pub store: Arc<Store>,
    pub runtime: Arc<TaskRuntime>,
    pub bridge: Arc<ProbeBridge>,
    pub pipeline: Arc<Pipeline>,
    pub provider: Arc<MockProvider>,
    pub embedder: Arc<MockEmbedder>,
    pub scraper: Arc<MockScraper>,
    pub ocr: Arc<MockOcr>,
    /// The pre-created test user.
    pub user_id: i64,
}

impl TestHarness {
    /// Build a harness with default settings and a plain OCR mock.
    pub async fn new() -> Self {
        Self::build(PipelineSettings::default(), MockOcr::new()).await
    }

    /// Build a harness with custom pipeline settings.
    pub async fn with_settings(settings: PipelineSettings) -> Self {
        Self::build(settings, MockOcr::new()).await
    }

    /// Build a harness with a custom OCR mock.
    pub async fn with_ocr(ocr: MockOcr) -> Self {
        Self::build(PipelineSettings::default(), ocr).await
    }

    async fn build(settings: PipelineSettings, ocr: MockOcr) -> Self {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let user_id = store.create_user("test-user", Some("Test User")).await.unwrap();

        let runtime = Arc::new(TaskRuntime::new(store.clone(), QUEUE, 300));
        let bridge = Arc::new(ProbeBridge::new(store.clone()));
        let provider = Arc::new(MockProvider::new());
        let embedder = Arc::new(MockEmbedder::new(4));
        let scraper = Arc::new(MockScraper::new());
        let ocr = Arc::new(ocr);

        let pipeline = Pipeline::new(
            store.clone(),
            runtime.clone(),
            bridge.clone(),
            provider.clone(),
            embedder.clone(),
            scraper.clone(),
            ocr.clone(),
            settings,
        );

        Self {
            store,
            runtime,
            bridge,
            pipeline,
            provider,
            embedder,
            scraper,
            ocr,
            user_id,
        }
    }

    /// Submit a URL for the test user. Returns the task id.
    pub async fn submit(&self, url: &str) -> i64 {
        self.pipeline
            .spawn_process_link(ProcessLinkParams {
                user_id: self.user_id,
                url: url.to_string(),
                link_id: None,
                scrape_data: None,
            })
            .await
            .unwrap()
    }

    /// Tick the runtime until no due task remains.
    ///
    /// Tasks deferred by a retry delay are left alone, so a drain after an
    /// induced failure observes the intermediate state.
    pub async fn drain(&self) {
        for _ in 0..256 {
            match self.runtime.tick().await.unwrap() {
                Some(_) => continue,
                None => return,
            }
        }
        panic!("queue did not drain within 256 ticks");
    }
}
