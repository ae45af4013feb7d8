// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pipeline wiring: task kinds, retry policies, spawns, and the probe
//! result entry point.

use std::sync::Arc;

use linkmap_bridge::ProbeBridge;
use linkmap_core::types::ScrapeData;
use linkmap_core::{ArticleScraper, EmbeddingAdapter, LinkmapError, MediaOcr, ProviderAdapter};
use linkmap_runtime::{RetryStrategy, SpawnOptions, TaskRuntime};
use linkmap_storage::Store;
use tracing::info;

use crate::handlers::{ProcessLinkHandler, RefreshRelatedHandler};
use crate::types::{ProcessLinkParams, RefreshRelatedParams};

/// Queue all pipeline tasks run on.
pub const QUEUE: &str = "pipeline";

/// Task kind for the full enrichment workflow.
pub const KIND_PROCESS_LINK: &str = "process-link";

/// Task kind for re-running the back half (embed/related/insight/export).
pub const KIND_REFRESH_RELATED: &str = "refresh-related";

/// Tunables for the related-links computation.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Minimum score at which two links are related.
    pub similarity_threshold: f64,
    /// Hard cap on stored relations per link.
    pub max_relations: usize,
    /// Candidates requested from the vector search.
    pub vector_search_k: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.65,
            max_relations: 5,
            vector_search_k: 10,
        }
    }
}

/// The pipeline: owns the collaborators the steps talk to.
pub struct Pipeline {
    pub(crate) store: Arc<Store>,
    runtime: Arc<TaskRuntime>,
    pub(crate) bridge: Arc<ProbeBridge>,
    pub(crate) provider: Arc<dyn ProviderAdapter>,
    pub(crate) embedder: Arc<dyn EmbeddingAdapter>,
    pub(crate) scraper: Arc<dyn ArticleScraper>,
    pub(crate) ocr: Arc<dyn MediaOcr>,
    pub(crate) settings: PipelineSettings,
}

impl Pipeline {
    /// Build the pipeline and bind both task kinds to the runtime.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        runtime: Arc<TaskRuntime>,
        bridge: Arc<ProbeBridge>,
        provider: Arc<dyn ProviderAdapter>,
        embedder: Arc<dyn EmbeddingAdapter>,
        scraper: Arc<dyn ArticleScraper>,
        ocr: Arc<dyn MediaOcr>,
        settings: PipelineSettings,
    ) -> Arc<Self> {
        let pipeline = Arc::new(Self {
            store,
            runtime,
            bridge,
            provider,
            embedder,
            scraper,
            ocr,
            settings,
        });
        pipeline.runtime.register(
            KIND_PROCESS_LINK,
            Arc::new(ProcessLinkHandler {
                pipeline: pipeline.clone(),
            }),
        );
        pipeline.runtime.register(
            KIND_REFRESH_RELATED,
            Arc::new(RefreshRelatedHandler {
                pipeline: pipeline.clone(),
            }),
        );
        pipeline
    }

    /// Enqueue a `process-link` task.
    pub async fn spawn_process_link(
        &self,
        params: ProcessLinkParams,
    ) -> Result<i64, LinkmapError> {
        let value = serde_json::to_value(&params)
            .map_err(|e| LinkmapError::Internal(format!("unserializable params: {e}")))?;
        self.runtime
            .spawn(
                KIND_PROCESS_LINK,
                value,
                SpawnOptions {
                    max_attempts: 3,
                    retry: RetryStrategy::Exponential {
                        base_secs: 10,
                        factor: 2,
                        max_secs: Some(300),
                    },
                },
            )
            .await
    }

    /// Enqueue a `refresh-related` task.
    pub async fn spawn_refresh_related(&self, link_id: i64) -> Result<i64, LinkmapError> {
        let value = serde_json::to_value(RefreshRelatedParams { link_id })
            .map_err(|e| LinkmapError::Internal(format!("unserializable params: {e}")))?;
        self.runtime
            .spawn(
                KIND_REFRESH_RELATED,
                value,
                SpawnOptions {
                    max_attempts: 2,
                    retry: RetryStrategy::Fixed { base_secs: 30 },
                },
            )
            .await
    }

    /// Probe result entry point.
    ///
    /// The suspended task already completed cleanly; this spawns a fresh
    /// `process-link` carrying the probe's payload, joined on the link id.
    pub async fn handle_probe_result(
        &self,
        event_id: &str,
        data: ScrapeData,
    ) -> Result<i64, LinkmapError> {
        let event = self
            .store
            .get_probe_event(event_id)
            .await?
            .ok_or_else(|| LinkmapError::NotFound(format!("probe event {event_id}")))?;

        let link = self
            .store
            .get_link(event.link_id)
            .await?
            .ok_or_else(|| LinkmapError::NotFound(format!("link {}", event.link_id)))?;

        if link.user_id != event.user_id {
            return Err(LinkmapError::Unauthorized(
                "probe event does not match link owner".to_string(),
            ));
        }

        let task_id = self
            .spawn_process_link(ProcessLinkParams {
                user_id: link.user_id,
                url: link.url.clone(),
                link_id: Some(link.id),
                scrape_data: Some(data),
            })
            .await?;
        info!(event_id, link_id = link.id, task_id, "pipeline re-spawned with probe result");
        Ok(task_id)
    }
}
