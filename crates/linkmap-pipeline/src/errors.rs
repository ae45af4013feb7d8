// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permanent-error classification and error-message hygiene.

/// Scrape errors that indicate the URL was a file, not a page, and will
/// never succeed. Matched by substring against the extractor's message.
/// This list is coupled to the extractor's Chromium-style backend; do not
/// reword entries, stored error messages depend on them.
pub const PERMANENT_SCRAPE_ERRORS: [&str; 3] = [
    "Download is starting",
    "net::ERR_ABORTED",
    "Navigation failed because page was closed",
];

/// Maximum stored error-message length.
pub const MAX_ERROR_LEN: usize = 1000;

/// True when the message matches a permanent scrape failure.
pub fn is_permanent_scrape_error(message: &str) -> bool {
    PERMANENT_SCRAPE_ERRORS
        .iter()
        .any(|needle| message.contains(needle))
}

/// Truncate an error message to the stored maximum, on a char boundary.
pub fn truncate_error(message: &str) -> String {
    if message.len() <= MAX_ERROR_LEN {
        return message.to_string();
    }
    let mut end = MAX_ERROR_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
