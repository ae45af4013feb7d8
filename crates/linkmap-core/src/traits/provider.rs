// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM provider adapter trait.

use async_trait::async_trait;

use crate::error::LinkmapError;
use crate::types::{CompletionRequest, CompletionResponse};

/// Adapter for the LLM used by the summarize and insight steps.
///
/// Implementations decide the model; callers only shape prompts and parse
/// the returned text.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Run a single non-streaming completion.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LinkmapError>;
}
