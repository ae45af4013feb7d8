// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store gateway for linkmap: SQLite persistence behind typed operations.
//!
//! Owns the single serialized connection, the embedded migrations, the FTS5
//! index for BM25, and the f32-BLOB vector storage used by the related-links
//! search.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod store;
pub mod vector;

pub use database::{now_iso, Database};
pub use models::{DeviceAuthRequest, Link, LinkUpdate, ProbeDevice, ProbeEvent, TaskRow, User};
pub use store::Store;
