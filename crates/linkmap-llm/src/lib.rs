// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API client used by the summarize and insight steps.

pub mod client;
pub mod types;

pub use client::AnthropicClient;
