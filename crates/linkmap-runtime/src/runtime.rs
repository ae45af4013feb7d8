// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task registration, spawning, and single-claim execution.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use linkmap_core::types::TaskState;
use linkmap_core::LinkmapError;
use linkmap_storage::Store;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::retry::RetryStrategy;
use crate::step::StepContext;

/// A task handler bound to a `kind`.
///
/// The handler is deterministic modulo its steps: orchestration code may
/// run on every attempt, but anything with a side effect belongs inside
/// `ctx.step` so replays skip it.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, params: Value, ctx: &StepContext) -> Result<Value, LinkmapError>;
}

/// Options for spawning a task.
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    pub max_attempts: i32,
    pub retry: RetryStrategy,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry: RetryStrategy::Fixed { base_secs: 30 },
        }
    }
}

/// External view of a task's progress.
#[derive(Debug, Clone)]
pub struct TaskStatus {
    pub state: TaskState,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub result: Option<Value>,
}

/// The runtime: a handler registry over one named queue.
///
/// Workers call [`tick`](TaskRuntime::tick) to claim and execute one task;
/// the [`WorkerPool`](crate::worker::WorkerPool) drives it continuously.
pub struct TaskRuntime {
    store: Arc<Store>,
    queue_name: String,
    claim_timeout_secs: u64,
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
}

impl TaskRuntime {
    pub fn new(store: Arc<Store>, queue_name: impl Into<String>, claim_timeout_secs: u64) -> Self {
        Self {
            store,
            queue_name: queue_name.into(),
            claim_timeout_secs,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// The store this runtime persists through.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Bind a handler to a task kind. Later registrations replace earlier
    /// ones.
    pub fn register(&self, kind: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        let kind = kind.into();
        debug!(kind = kind.as_str(), "task handler registered");
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind, handler);
    }

    /// Enqueue a new task. Returns its id.
    pub async fn spawn(
        &self,
        kind: &str,
        params: Value,
        opts: SpawnOptions,
    ) -> Result<i64, LinkmapError> {
        let params_json = params.to_string();
        let strategy_json = serde_json::to_string(&opts.retry)
            .map_err(|e| LinkmapError::Internal(format!("unserializable retry strategy: {e}")))?;
        let id = self
            .store
            .create_task(
                &self.queue_name,
                kind,
                &params_json,
                opts.max_attempts,
                &strategy_json,
            )
            .await?;
        debug!(task_id = id, kind, "task spawned");
        Ok(id)
    }

    /// Release expired claims, then claim and fully execute one task.
    ///
    /// Returns the executed task's id, or `None` when the queue was empty.
    /// Handler failures are recorded against the retry policy and do not
    /// surface as errors here.
    pub async fn tick(&self) -> Result<Option<i64>, LinkmapError> {
        let released = self.store.release_expired_tasks(&self.queue_name).await?;
        if released > 0 {
            warn!(released, queue = self.queue_name.as_str(), "expired claims returned to queue");
        }

        let Some(task) = self
            .store
            .claim_next_task(&self.queue_name, self.claim_timeout_secs)
            .await?
        else {
            return Ok(None);
        };

        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&task.kind)
            .cloned();

        let Some(handler) = handler else {
            error!(task_id = task.id, kind = task.kind.as_str(), "no handler for task kind");
            self.store
                .fail_task(task.id, &format!("no handler registered for kind '{}'", task.kind), None)
                .await?;
            return Ok(Some(task.id));
        };

        let params: Value = match serde_json::from_str(&task.params) {
            Ok(v) => v,
            Err(e) => {
                self.store
                    .fail_task(task.id, &format!("malformed task params: {e}"), None)
                    .await?;
                return Ok(Some(task.id));
            }
        };

        let ctx = StepContext::new(task.id, self.store.clone());
        match handler.run(params, &ctx).await {
            Ok(result) => {
                self.store.complete_task(task.id, &result.to_string()).await?;
                debug!(task_id = task.id, kind = task.kind.as_str(), "task completed");
            }
            Err(e) => {
                let strategy: RetryStrategy = serde_json::from_str(&task.retry_strategy)
                    .unwrap_or(RetryStrategy::Fixed { base_secs: 30 });
                // `task.attempts` is the count before this failure.
                let failed_attempt = (task.attempts + 1).max(1) as u32;
                let delay = strategy.delay_secs(failed_attempt);
                let not_before = (chrono::Utc::now() + chrono::Duration::seconds(delay as i64))
                    .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                    .to_string();
                let state = self
                    .store
                    .fail_task(task.id, &e.to_string(), Some(not_before))
                    .await?;
                warn!(
                    task_id = task.id,
                    kind = task.kind.as_str(),
                    attempt = failed_attempt,
                    state = %state,
                    retry_delay_secs = delay,
                    error = %e,
                    "task attempt failed"
                );
            }
        }

        Ok(Some(task.id))
    }

    /// Report a task's state, attempts, last error, and final result.
    pub async fn task_status(&self, id: i64) -> Result<Option<TaskStatus>, LinkmapError> {
        let Some(task) = self.store.get_task(id).await? else {
            return Ok(None);
        };
        Ok(Some(TaskStatus {
            state: task.status,
            attempt_count: task.attempts,
            last_error: task.last_error,
            result: task.result.and_then(|r| serde_json::from_str(&r).ok()),
        }))
    }

    /// Cancel a queued or claimed task. Terminal; never retried.
    pub async fn cancel(&self, id: i64) -> Result<bool, LinkmapError> {
        self.store.cancel_task(id).await
    }
}
