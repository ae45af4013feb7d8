// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cooperative worker pool polling the task queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::runtime::TaskRuntime;

/// A pool of workers driving one [`TaskRuntime`].
///
/// Each worker loops `tick()`: after executing a task it polls again
/// immediately, after an empty claim it sleeps for the poll interval.
/// Workers shut down when the cancellation token fires.
pub struct WorkerPool {
    runtime: Arc<TaskRuntime>,
    workers: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(runtime: Arc<TaskRuntime>, workers: usize, poll_interval: Duration) -> Self {
        Self {
            runtime,
            workers,
            poll_interval,
        }
    }

    /// Spawn the worker tasks. Returns their join handles.
    pub fn start(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        (0..self.workers)
            .map(|index| {
                let runtime = self.runtime.clone();
                let poll_interval = self.poll_interval;
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    worker_loop(runtime, index, poll_interval, cancel).await;
                })
            })
            .collect()
    }
}

async fn worker_loop(
    runtime: Arc<TaskRuntime>,
    index: usize,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    info!(worker = index, "pipeline worker started");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        match runtime.tick().await {
            // Executed a task: poll again right away, more may be queued.
            Ok(Some(_)) => continue,
            Ok(None) => {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = cancel.cancelled() => break,
                }
            }
            Err(e) => {
                warn!(worker = index, error = %e, "worker tick failed");
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }
    }
    info!(worker = index, "pipeline worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{SpawnOptions, TaskHandler};
    use crate::step::StepContext;
    use async_trait::async_trait;
    use linkmap_core::types::TaskState;
    use linkmap_core::LinkmapError;
    use linkmap_storage::Store;
    use serde_json::{json, Value};

    struct SleepyHandler;

    #[async_trait]
    impl TaskHandler for SleepyHandler {
        async fn run(&self, params: Value, _ctx: &StepContext) -> Result<Value, LinkmapError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(params)
        }
    }

    #[tokio::test]
    async fn pool_drains_queue_and_stops() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let runtime = Arc::new(TaskRuntime::new(store, "q", 300));
        runtime.register("sleepy", Arc::new(SleepyHandler));

        let mut ids = Vec::new();
        for i in 0..6 {
            ids.push(
                runtime
                    .spawn("sleepy", json!({ "n": i }), SpawnOptions::default())
                    .await
                    .unwrap(),
            );
        }

        let cancel = CancellationToken::new();
        let pool = WorkerPool::new(runtime.clone(), 2, Duration::from_millis(10));
        let handles = pool.start(cancel.clone());

        // Wait for all tasks to reach a terminal state.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let mut done = 0;
            for id in &ids {
                let status = runtime.task_status(*id).await.unwrap().unwrap();
                if status.state == TaskState::Completed {
                    done += 1;
                }
            }
            if done == ids.len() {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "queue did not drain");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn cancelled_pool_stops_promptly() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let runtime = Arc::new(TaskRuntime::new(store, "q", 300));

        let cancel = CancellationToken::new();
        let pool = WorkerPool::new(runtime, 1, Duration::from_millis(5));
        let handles = pool.start(cancel.clone());

        cancel.cancel();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("worker should stop after cancel")
                .unwrap();
        }
    }
}
