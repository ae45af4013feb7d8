// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task handlers binding the pipeline to the durable runtime.

use std::sync::Arc;

use async_trait::async_trait;
use linkmap_core::types::LinkStatus;
use linkmap_core::LinkmapError;
use linkmap_runtime::{StepContext, TaskHandler};
use linkmap_storage::models::LinkUpdate;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::{is_permanent_scrape_error, truncate_error};
use crate::pipeline::Pipeline;
use crate::types::{ProcessLinkParams, RefreshRelatedParams, ScrapeOutcome};

/// Handler for `process-link`.
pub struct ProcessLinkHandler {
    pub(crate) pipeline: Arc<Pipeline>,
}

#[async_trait]
impl TaskHandler for ProcessLinkHandler {
    async fn run(&self, params: Value, ctx: &StepContext) -> Result<Value, LinkmapError> {
        let params: ProcessLinkParams = serde_json::from_value(params)
            .map_err(|e| LinkmapError::Validation(format!("bad process-link params: {e}")))?;
        self.pipeline.run_process_link(params, ctx).await
    }
}

/// Handler for `refresh-related`.
pub struct RefreshRelatedHandler {
    pub(crate) pipeline: Arc<Pipeline>,
}

#[async_trait]
impl TaskHandler for RefreshRelatedHandler {
    async fn run(&self, params: Value, ctx: &StepContext) -> Result<Value, LinkmapError> {
        let params: RefreshRelatedParams = serde_json::from_value(params)
            .map_err(|e| LinkmapError::Validation(format!("bad refresh-related params: {e}")))?;
        self.pipeline.run_refresh_related(params, ctx).await
    }
}

impl Pipeline {
    /// The `process-link` workflow.
    ///
    /// Admission (upsert + reset to `pending`) runs outside the steps and
    /// is idempotent; the six steps are memoized. Any step failure lands in
    /// the top-level catch, which records `status=error` with a truncated
    /// message and then either swallows the error (permanent scrape
    /// failures: the URL was a file, not a page) or re-raises it for the
    /// runtime's retry policy.
    pub(crate) async fn run_process_link(
        &self,
        params: ProcessLinkParams,
        ctx: &StepContext,
    ) -> Result<Value, LinkmapError> {
        let link_id = match params.link_id {
            Some(id) => id,
            None => self.store.upsert_link(params.user_id, &params.url).await?.0,
        };
        self.store
            .update_link(
                link_id,
                LinkUpdate {
                    status: Some(LinkStatus::Pending),
                    error: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        match self.execute_process_link(&params, link_id, ctx).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let message = truncate_error(&e.to_string());
                if let Err(write_err) = self
                    .store
                    .update_link(
                        link_id,
                        LinkUpdate {
                            status: Some(LinkStatus::Error),
                            error: Some(Some(message.clone())),
                            ..Default::default()
                        },
                    )
                    .await
                {
                    warn!(link_id, error = %write_err, "failed to record link error");
                }

                if is_permanent_scrape_error(&message) {
                    info!(link_id, error = message.as_str(), "permanent scrape error, not retrying");
                    return Ok(json!({ "status": "error", "permanent": true }));
                }
                Err(e)
            }
        }
    }

    async fn execute_process_link(
        &self,
        params: &ProcessLinkParams,
        link_id: i64,
        ctx: &StepContext,
    ) -> Result<Value, LinkmapError> {
        let scrape: ScrapeOutcome = ctx
            .step("scrape", || self.step_scrape(params, link_id))
            .await?;
        let scrape_cp = match scrape {
            // Clean early return: the task completes and a new one is
            // spawned when the probe result arrives.
            ScrapeOutcome::Suspended => {
                return Ok(json!({ "status": "waiting_probe" }));
            }
            ScrapeOutcome::Completed(cp) => cp,
        };

        ctx.step("summarize", || self.step_summarize(link_id, &scrape_cp))
            .await?;
        let vector: Vec<f32> = ctx.step("embed", || self.step_embed(link_id)).await?;
        let related = ctx
            .step("related", || {
                self.step_related(link_id, params.user_id, &vector)
            })
            .await?;
        ctx.step("insight", || self.step_insight(link_id, &related))
            .await?;
        ctx.step("export", || self.step_export(link_id)).await?;

        Ok(json!({ "status": "analyzed" }))
    }

    /// The `refresh-related` workflow: resumes from the middle of the
    /// pipeline for an already-analyzed link. Never re-scrapes or
    /// re-summarizes; reuses the stored vector when present.
    pub(crate) async fn run_refresh_related(
        &self,
        params: RefreshRelatedParams,
        ctx: &StepContext,
    ) -> Result<Value, LinkmapError> {
        let link = self
            .store
            .get_link(params.link_id)
            .await?
            .ok_or_else(|| LinkmapError::NotFound(format!("link {}", params.link_id)))?;

        let vector = match link.summary_vector.clone() {
            Some(vector) => vector,
            None => ctx.step("embed", || self.step_embed(link.id)).await?,
        };

        let related = ctx
            .step("related", || {
                self.step_related(link.id, link.user_id, &vector)
            })
            .await?;
        ctx.step("insight", || self.step_insight(link.id, &related))
            .await?;
        ctx.step("export", || self.step_export(link.id)).await?;

        Ok(json!({ "status": "refreshed" }))
    }
}
