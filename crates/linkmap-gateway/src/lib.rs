// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission HTTP API built on axum.
//!
//! A thin surface: every handler validates, delegates to the store, the
//! runtime, the pipeline, or the bridge, and never blocks on pipeline
//! completion (always spawn-and-return).

pub mod auth;
pub mod device_auth;
pub mod error;
pub mod handlers;
pub mod probe_routes;
pub mod server;

pub use auth::SessionAuth;
pub use server::{router, serve, AppState};
