// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable task runtime for linkmap.
//!
//! A persistent task queue with per-task step memoization: each task is a
//! sequence of named steps, and each step's return value is persisted on
//! first success so a resumption after a crash or lease expiry skips
//! completed steps and reruns only the in-flight one.

pub mod retry;
pub mod runtime;
pub mod step;
pub mod worker;

pub use retry::RetryStrategy;
pub use runtime::{SpawnOptions, TaskHandler, TaskRuntime, TaskStatus};
pub use step::StepContext;
pub use worker::WorkerPool;
