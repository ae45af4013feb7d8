// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable task queue operations with per-step memoization rows.
//!
//! Claiming uses a transaction to atomically select the oldest due task and
//! lock it under a lease. An expired lease returns the task to the queue
//! without touching the attempt counter; failed attempts are the only thing
//! that counts against `max_attempts`.

use linkmap_core::types::TaskState;
use linkmap_core::LinkmapError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::TaskRow;

const TASK_COLUMNS: &str = "id, queue_name, kind, params, status, attempts, max_attempts, \
     retry_strategy, not_before, locked_until, last_error, result, created_at, updated_at";

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<TaskRow> {
    let status: String = row.get(4)?;
    Ok(TaskRow {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        kind: row.get(2)?,
        params: row.get(3)?,
        status: TaskState::from_str_value(&status),
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        retry_strategy: row.get(7)?,
        not_before: row.get(8)?,
        locked_until: row.get(9)?,
        last_error: row.get(10)?,
        result: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Enqueue a new task. Returns the task id.
pub async fn create_task(
    db: &Database,
    queue_name: &str,
    kind: &str,
    params_json: &str,
    max_attempts: i32,
    retry_strategy_json: &str,
) -> Result<i64, LinkmapError> {
    let queue_name = queue_name.to_string();
    let kind = kind.to_string();
    let params_json = params_json.to_string();
    let retry_strategy_json = retry_strategy_json.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tasks (queue_name, kind, params, max_attempts, retry_strategy)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![queue_name, kind, params_json, max_attempts, retry_strategy_json],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically claim the oldest due task from the named queue.
///
/// Claims set `locked_until = now + lease_secs`. Returns `None` when the
/// queue has no due task.
pub async fn claim_next(
    db: &Database,
    queue_name: &str,
    lease_secs: u64,
) -> Result<Option<TaskRow>, LinkmapError> {
    let queue_name = queue_name.to_string();
    let lease_modifier = format!("+{lease_secs} seconds");
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE queue_name = ?1 AND status = 'queued'
                       AND (not_before IS NULL
                            OR not_before <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                     ORDER BY id ASC
                     LIMIT 1"
                ))?;
                stmt.query_row(params![queue_name], row_to_task).optional()?
            };

            match result {
                Some(task) => {
                    tx.execute(
                        "UPDATE tasks SET status = 'claimed',
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?2",
                        params![lease_modifier, task.id],
                    )?;
                    tx.commit()?;
                    Ok(Some(TaskRow {
                        status: TaskState::Claimed,
                        ..task
                    }))
                }
                None => {
                    tx.commit()?;
                    Ok(None)
                }
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Record a handler's final result and mark the task completed.
///
/// Only applies to tasks still in `claimed`; an externally cancelled task
/// stays terminal.
pub async fn complete_task(
    db: &Database,
    id: i64,
    result_json: &str,
) -> Result<(), LinkmapError> {
    let result_json = result_json.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE tasks SET status = 'completed', result = ?1, locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND status = 'claimed'",
                params![result_json, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed attempt.
///
/// Increments `attempts`; once they reach `max_attempts` the task is
/// `failed`, otherwise it returns to `queued` with `not_before` set to the
/// caller-computed retry time. Returns the resulting state.
pub async fn fail_task(
    db: &Database,
    id: i64,
    error: &str,
    not_before: Option<String>,
) -> Result<TaskState, LinkmapError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let (attempts, max_attempts, status): (i32, i32, String) = tx.query_row(
                "SELECT attempts, max_attempts, status FROM tasks WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

            // An externally cancelled task stays terminal; report its state
            // back without recording the attempt.
            let current = TaskState::from_str_value(&status);
            if current.is_terminal() {
                tx.commit()?;
                return Ok(current);
            }

            let new_attempts = attempts + 1;
            let state = if new_attempts >= max_attempts {
                tx.execute(
                    "UPDATE tasks SET status = 'failed', attempts = ?1, last_error = ?2,
                     locked_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?3",
                    params![new_attempts, error, id],
                )?;
                TaskState::Failed
            } else {
                tx.execute(
                    "UPDATE tasks SET status = 'queued', attempts = ?1, last_error = ?2,
                     locked_until = NULL, not_before = ?3,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?4",
                    params![new_attempts, error, not_before, id],
                )?;
                TaskState::Queued
            };

            tx.commit()?;
            Ok(state)
        })
        .await
        .map_err(map_tr_err)
}

/// Return expired claims to the queue without counting an attempt.
///
/// Covers worker crashes and hangs: the memoized steps make the rerun skip
/// whatever already finished.
pub async fn release_expired(db: &Database, queue_name: &str) -> Result<usize, LinkmapError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let released = conn.execute(
                "UPDATE tasks SET status = 'queued', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE queue_name = ?1 AND status = 'claimed'
                   AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![queue_name],
            )?;
            Ok(released)
        })
        .await
        .map_err(map_tr_err)
}

/// Nullable read by task id.
pub async fn get_task(db: &Database, id: i64) -> Result<Option<TaskRow>, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;
            let task = stmt.query_row(params![id], row_to_task).optional()?;
            Ok(task)
        })
        .await
        .map_err(map_tr_err)
}

/// Cancel a task that has not reached a terminal state.
///
/// Returns `false` when the task is already terminal (or unknown).
pub async fn cancel_task(db: &Database, id: i64) -> Result<bool, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE tasks SET status = 'cancelled', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status IN ('queued', 'claimed')",
                params![id],
            )?;
            Ok(affected > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Read a memoized step value.
pub async fn get_step(
    db: &Database,
    task_id: i64,
    step_name: &str,
) -> Result<Option<String>, LinkmapError> {
    let step_name = step_name.to_string();
    db.connection()
        .call(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM task_steps WHERE task_id = ?1 AND step_name = ?2",
                    params![task_id, step_name],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
        .map_err(map_tr_err)
}

/// Persist a step's return value. Replaces on rerun after a crash mid-write.
pub async fn put_step(
    db: &Database,
    task_id: i64,
    step_name: &str,
    value_json: &str,
) -> Result<(), LinkmapError> {
    let step_name = step_name.to_string();
    let value_json = value_json.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO task_steps (task_id, step_name, value)
                 VALUES (?1, ?2, ?3)",
                params![task_id, step_name, value_json],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
