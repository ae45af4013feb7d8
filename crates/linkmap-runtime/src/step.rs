// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-task step memoization.

use std::future::Future;
use std::sync::Arc;

use linkmap_core::LinkmapError;
use linkmap_storage::Store;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Execution context handed to task handlers.
///
/// `step` runs a named closure at most once per task: the first successful
/// return is persisted keyed by `(task_id, name)`, and subsequent
/// resumptions return the memoized value without re-running the closure.
/// The memo row is written before the value is handed back, so a crash
/// after the write never re-runs the step; a crash before it reruns the
/// step, which step authors must make replay-safe.
pub struct StepContext {
    task_id: i64,
    store: Arc<Store>,
}

impl StepContext {
    pub fn new(task_id: i64, store: Arc<Store>) -> Self {
        Self { task_id, store }
    }

    /// The id of the task being executed.
    pub fn task_id(&self) -> i64 {
        self.task_id
    }

    /// Execute `f` at most once for this task under the given step name.
    pub async fn step<T, F, Fut>(&self, name: &str, f: F) -> Result<T, LinkmapError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LinkmapError>>,
    {
        if let Some(json) = self.store.get_step(self.task_id, name).await? {
            let value = serde_json::from_str(&json).map_err(|e| {
                LinkmapError::Internal(format!(
                    "corrupt checkpoint for step '{name}' of task {}: {e}",
                    self.task_id
                ))
            })?;
            debug!(task_id = self.task_id, step = name, "step replayed from checkpoint");
            return Ok(value);
        }

        let value = f().await?;

        let json = serde_json::to_string(&value).map_err(|e| {
            LinkmapError::Internal(format!(
                "unserializable return from step '{name}' of task {}: {e}",
                self.task_id
            ))
        })?;
        self.store.put_step(self.task_id, name, &json).await?;
        debug!(task_id = self.task_id, step = name, "step executed and checkpointed");

        Ok(value)
    }
}
