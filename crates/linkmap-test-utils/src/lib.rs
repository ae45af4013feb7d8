// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock adapters and a full-stack harness for fast, CI-runnable tests
//! without external API calls.

pub mod harness;
pub mod mock_embedder;
pub mod mock_provider;
pub mod mock_scraper;

pub use harness::TestHarness;
pub use mock_embedder::MockEmbedder;
pub use mock_provider::MockProvider;
pub use mock_scraper::{MockOcr, MockScraper};
