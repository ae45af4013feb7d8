// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server side of the probe bridge.
//!
//! Maintains the in-memory set of active probe subscriptions per user,
//! serializes events onto those subscriptions, accepts result callbacks,
//! and runs the device-code enrollment flow.

pub mod bridge;
pub mod enroll;

pub use bridge::{ProbeBridge, SseFrame, Subscription};
pub use enroll::{DeviceAuthGrant, TokenPoll};
