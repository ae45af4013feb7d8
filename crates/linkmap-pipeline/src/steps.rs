// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The six pipeline steps.
//!
//! Each step reads from the store, computes, writes back, and returns a
//! compact checkpoint. Steps are replay-safe: their writes are idempotent
//! per link, so a rerun after a crash mid-step converges on the same state.

use linkmap_core::types::{CompletionRequest, LinkStatus, ScrapeData, UrlKind};
use linkmap_core::LinkmapError;
use linkmap_storage::models::LinkUpdate;
use linkmap_storage::Link;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::pipeline::Pipeline;
use crate::types::{ProcessLinkParams, RelatedEntry, ScrapeCheckpoint, ScrapeOutcome, SummarizeCheckpoint};

/// Marker heading under which OCR text is appended to the markdown fed to
/// the summarizer.
const OCR_MARKER: &str = "## Text extracted from images";

const SUMMARIZE_SYSTEM: &str = "You summarize saved web pages for a personal link archive. \
Respond with a JSON object: {\"summary\": \"2-4 sentence summary\", \
\"tags\": [\"3-6 short lowercase topic tags\"]}. No other text.";

const INSIGHT_SYSTEM: &str = "You connect a newly saved page to pages the user saved earlier. \
Write 1-3 sentences pointing out the thread that ties them together, or what is notable \
about this page on its own. Plain text, no preamble.";

impl Pipeline {
    /// Step 1: scrape.
    ///
    /// Three sub-paths: probe-supplied data is written directly;
    /// probe-required URLs create a probe event, park the link in
    /// `waiting_probe`, and suspend; everything else goes through the
    /// coordinator-side extractor.
    pub(crate) async fn step_scrape(
        &self,
        params: &ProcessLinkParams,
        link_id: i64,
    ) -> Result<ScrapeOutcome, LinkmapError> {
        let kind = UrlKind::classify(&params.url);

        if let Some(data) = &params.scrape_data {
            let checkpoint = self.apply_scrape_data(link_id, data, true).await?;
            return Ok(ScrapeOutcome::Completed(checkpoint));
        }

        if kind == UrlKind::Twitter {
            let event_id = uuid::Uuid::new_v4().to_string();
            self.store
                .create_probe_event(&event_id, params.user_id, link_id, &params.url, kind)
                .await?;
            self.store
                .update_link(
                    link_id,
                    LinkUpdate {
                        status: Some(LinkStatus::WaitingProbe),
                        ..Default::default()
                    },
                )
                .await?;
            let event = self
                .store
                .get_probe_event(&event_id)
                .await?
                .ok_or_else(|| {
                    LinkmapError::Internal(format!("probe event {event_id} vanished"))
                })?;
            let delivered = self.bridge.dispatch_scrape_request(&event).await?;
            info!(link_id, event_id = event_id.as_str(), delivered, "scrape suspended on probe");
            return Ok(ScrapeOutcome::Suspended);
        }

        let data = self.scraper.scrape(&params.url).await?;
        // Media processing only applies to the Twitter kind; plain web
        // pages skip the OCR pass.
        let checkpoint = self
            .apply_scrape_data(link_id, &data, kind == UrlKind::Twitter)
            .await?;
        Ok(ScrapeOutcome::Completed(checkpoint))
    }

    /// Persist scraped fields and collect OCR text from attached media.
    async fn apply_scrape_data(
        &self,
        link_id: i64,
        data: &ScrapeData,
        process_media: bool,
    ) -> Result<ScrapeCheckpoint, LinkmapError> {
        let ocr_texts = if process_media {
            match data.raw_media.as_deref() {
                Some(media) if !media.is_empty() => {
                    match self.ocr.extract_text(media).await {
                        Ok(texts) => texts,
                        // Image/OCR failures are non-fatal.
                        Err(e) => {
                            warn!(link_id, error = %e, "media OCR failed, continuing without");
                            vec![]
                        }
                    }
                }
                _ => vec![],
            }
        } else {
            vec![]
        };

        let title = data.title.clone().or_else(|| data.og_title.clone());
        let images = data
            .raw_media
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| LinkmapError::Internal(format!("unserializable media list: {e}")))?;

        self.store
            .update_link(
                link_id,
                LinkUpdate {
                    title: title.clone(),
                    description: data.og_description.clone(),
                    image: data.og_image.clone(),
                    site_name: data.og_site_name.clone(),
                    og_type: data.og_type.clone(),
                    markdown: Some(data.markdown.clone()),
                    images,
                    status: Some(LinkStatus::Scraped),
                    ..Default::default()
                },
            )
            .await?;

        debug!(link_id, markdown_len = data.markdown.len(), "scrape persisted");
        Ok(ScrapeCheckpoint {
            title,
            og_description: data.og_description.clone(),
            site_name: data.og_site_name.clone(),
            markdown_length: data.markdown.len(),
            ocr_texts,
        })
    }

    /// Step 2: summarize.
    ///
    /// Reads the markdown from the store (checkpoints do not carry full
    /// content), appends OCR text under the marker heading, and parses the
    /// summarizer's JSON with a raw-text fallback.
    pub(crate) async fn step_summarize(
        &self,
        link_id: i64,
        scrape: &ScrapeCheckpoint,
    ) -> Result<SummarizeCheckpoint, LinkmapError> {
        let link = self.require_link(link_id).await?;
        let mut content = link.markdown.clone().unwrap_or_default();
        if !scrape.ocr_texts.is_empty() {
            content.push_str("\n\n");
            content.push_str(OCR_MARKER);
            for text in &scrape.ocr_texts {
                content.push_str("\n\n");
                content.push_str(text);
            }
        }

        let prompt = format!(
            "URL: {}\nTitle: {}\n\n{}",
            link.url,
            link.title.as_deref().unwrap_or("(untitled)"),
            content
        );
        let response = self
            .provider
            .complete(CompletionRequest {
                system: Some(SUMMARIZE_SYSTEM.to_string()),
                prompt,
                max_tokens: 1024,
            })
            .await?;

        let (summary, tags) = parse_summary_response(&response.content);
        self.store
            .update_link(
                link_id,
                LinkUpdate {
                    summary: Some(summary.clone()),
                    tags: Some(tags.clone()),
                    ..Default::default()
                },
            )
            .await?;

        debug!(link_id, tags = tags.len(), "summary persisted");
        Ok(SummarizeCheckpoint { summary, tags })
    }

    /// Step 3: embed. Returns the vector so `related` avoids a re-read.
    pub(crate) async fn step_embed(&self, link_id: i64) -> Result<Vec<f32>, LinkmapError> {
        let link = self.require_link(link_id).await?;
        let summary = link.summary.clone().ok_or_else(|| {
            LinkmapError::Internal(format!("link {link_id} has no summary to embed"))
        })?;

        let mut vectors = self.embedder.embed(&[summary]).await?;
        if vectors.is_empty() {
            return Err(LinkmapError::Provider {
                message: "embedder returned no vector".to_string(),
                source: None,
            });
        }
        let vector = vectors.swap_remove(0);

        self.store
            .update_link(
                link_id,
                LinkUpdate {
                    summary_vector: Some(vector.clone()),
                    ..Default::default()
                },
            )
            .await?;

        debug!(link_id, dimensions = vector.len(), "summary vector stored");
        Ok(vector)
    }

    /// Step 4: related.
    ///
    /// Retains candidates at or above the threshold, caps them, and
    /// replaces the link's outgoing relations. Tie-break: higher score
    /// first, then lower link id.
    pub(crate) async fn step_related(
        &self,
        link_id: i64,
        user_id: i64,
        vector: &[f32],
    ) -> Result<Vec<RelatedEntry>, LinkmapError> {
        let candidates = self
            .store
            .vector_search(vector.to_vec(), user_id, link_id, self.settings.vector_search_k)
            .await?;

        let mut retained: Vec<(i64, f64)> = candidates
            .into_iter()
            .filter(|(_, score)| *score >= self.settings.similarity_threshold)
            .collect();
        retained.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        retained.truncate(self.settings.max_relations);

        self.store.save_relations(link_id, retained.clone()).await?;
        debug!(link_id, relations = retained.len(), "relations saved");

        Ok(retained
            .into_iter()
            .map(|(link_id, score)| RelatedEntry { link_id, score })
            .collect())
    }

    /// Step 5: insight. Writes the text and flips the link to `analyzed`.
    pub(crate) async fn step_insight(
        &self,
        link_id: i64,
        related: &[RelatedEntry],
    ) -> Result<(), LinkmapError> {
        let link = self.require_link(link_id).await?;

        let mut context = String::new();
        for entry in related {
            if let Some(rel) = self.store.get_link(entry.link_id).await? {
                context.push_str(&format!(
                    "- {} ({})\n  {}\n",
                    rel.title.as_deref().unwrap_or(&rel.url),
                    rel.url,
                    rel.summary.as_deref().unwrap_or("")
                ));
            }
        }

        let prompt = if context.is_empty() {
            format!(
                "New page:\n{} ({})\n{}\n\nNo related pages saved yet.",
                link.title.as_deref().unwrap_or("(untitled)"),
                link.url,
                link.summary.as_deref().unwrap_or("")
            )
        } else {
            format!(
                "New page:\n{} ({})\n{}\n\nPreviously saved related pages:\n{}",
                link.title.as_deref().unwrap_or("(untitled)"),
                link.url,
                link.summary.as_deref().unwrap_or(""),
                context
            )
        };

        let response = self
            .provider
            .complete(CompletionRequest {
                system: Some(INSIGHT_SYSTEM.to_string()),
                prompt,
                max_tokens: 512,
            })
            .await?;

        self.store
            .update_link(
                link_id,
                LinkUpdate {
                    insight: Some(response.content.trim().to_string()),
                    status: Some(LinkStatus::Analyzed),
                    ..Default::default()
                },
            )
            .await?;

        info!(link_id, "link analyzed");
        Ok(())
    }

    /// Step 6: export. A no-op hook that participates in memoization so it
    /// can grow behavior without touching the orchestration.
    pub(crate) async fn step_export(&self, _link_id: i64) -> Result<(), LinkmapError> {
        Ok(())
    }

    async fn require_link(&self, link_id: i64) -> Result<Link, LinkmapError> {
        self.store
            .get_link(link_id)
            .await?
            .ok_or_else(|| LinkmapError::NotFound(format!("link {link_id}")))
    }
}

/// Parse the summarizer's `{"summary": .., "tags": [..]}` output.
///
/// Falls back to the raw text as summary with empty tags when the model
/// did not return parseable JSON.
fn parse_summary_response(text: &str) -> (String, Vec<String>) {
    #[derive(Deserialize)]
    struct Parsed {
        summary: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    let trimmed = text.trim();
    if let Ok(parsed) = serde_json::from_str::<Parsed>(trimmed) {
        return (parsed.summary, parsed.tags);
    }

    // Models sometimes wrap the object in prose or code fences; try the
    // outermost braces before giving up.
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(parsed) = serde_json::from_str::<Parsed>(&trimmed[start..=end]) {
                return (parsed.summary, parsed.tags);
            }
        }
    }

    (trimmed.to_string(), vec![])
}
