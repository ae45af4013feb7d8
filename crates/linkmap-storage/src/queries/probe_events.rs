// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Probe event operations.
//!
//! A probe event is created when the pipeline suspends waiting for a local
//! scrape, pushed to subscribed probes, and completed (or errored) by the
//! result callback.

use linkmap_core::types::{ProbeEventStatus, UrlKind};
use linkmap_core::LinkmapError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::ProbeEvent;

const EVENT_COLUMNS: &str =
    "id, user_id, link_id, url, url_kind, status, result, error, created_at, sent_at, completed_at";

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<ProbeEvent> {
    let url_kind: String = row.get(4)?;
    let status: String = row.get(5)?;
    Ok(ProbeEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        link_id: row.get(2)?,
        url: row.get(3)?,
        url_kind: UrlKind::from_str_value(&url_kind),
        status: ProbeEventStatus::from_str_value(&status),
        result: row.get(6)?,
        error: row.get(7)?,
        created_at: row.get(8)?,
        sent_at: row.get(9)?,
        completed_at: row.get(10)?,
    })
}

/// Create a pending probe event.
pub async fn create_probe_event(
    db: &Database,
    id: &str,
    user_id: i64,
    link_id: i64,
    url: &str,
    url_kind: UrlKind,
) -> Result<(), LinkmapError> {
    let id = id.to_string();
    let url = url.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO probe_events (id, user_id, link_id, url, url_kind)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, user_id, link_id, url, url_kind.as_str()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Nullable read by event id.
pub async fn get_probe_event(
    db: &Database,
    id: &str,
) -> Result<Option<ProbeEvent>, LinkmapError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM probe_events WHERE id = ?1"
            ))?;
            let event = stmt.query_row(params![id], row_to_event).optional()?;
            Ok(event)
        })
        .await
        .map_err(map_tr_err)
}

/// Transition an event's status, recording the result payload or error
/// text and stamping `sent_at`/`completed_at` as appropriate.
pub async fn set_probe_event_status(
    db: &Database,
    id: &str,
    status: ProbeEventStatus,
    result: Option<String>,
    error: Option<String>,
) -> Result<(), LinkmapError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            match status {
                ProbeEventStatus::Sent => {
                    conn.execute(
                        "UPDATE probe_events SET status = 'sent',
                         sent_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![id],
                    )?;
                }
                ProbeEventStatus::Completed => {
                    conn.execute(
                        "UPDATE probe_events SET status = 'completed', result = ?1,
                         completed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?2",
                        params![result, id],
                    )?;
                }
                ProbeEventStatus::Error => {
                    conn.execute(
                        "UPDATE probe_events SET status = 'error', error = ?1 WHERE id = ?2",
                        params![error, id],
                    )?;
                }
                ProbeEventStatus::Pending => {
                    conn.execute(
                        "UPDATE probe_events SET status = 'pending' WHERE id = ?1",
                        params![id],
                    )?;
                }
            }
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Pending events for a user in creation order, for replay on subscribe.
pub async fn list_pending_probe_events(
    db: &Database,
    user_id: i64,
) -> Result<Vec<ProbeEvent>, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM probe_events
                 WHERE user_id = ?1 AND status = 'pending'
                 ORDER BY created_at ASC, id ASC"
            ))?;
            let events = stmt
                .query_map(params![user_id], row_to_event)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(events)
        })
        .await
        .map_err(map_tr_err)
}

/// Count of a user's not-yet-completed events, for the status endpoint.
pub async fn count_pending_probe_events(
    db: &Database,
    user_id: i64,
) -> Result<i64, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM probe_events
                 WHERE user_id = ?1 AND status IN ('pending', 'sent')",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}

/// Expire unanswered events created before `cutoff`.
///
/// Marks matching `pending`/`sent` events as `error` and returns their
/// `(event_id, link_id)` pairs so the caller can move the waiting links out
/// of `waiting_probe`.
pub async fn expire_probe_events_before(
    db: &Database,
    cutoff: &str,
) -> Result<Vec<(String, i64)>, LinkmapError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let expired: Vec<(String, i64)> = {
                let mut stmt = tx.prepare(
                    "SELECT id, link_id FROM probe_events
                     WHERE status IN ('pending', 'sent') AND created_at < ?1",
                )?;
                let rows = stmt
                    .query_map(params![cutoff], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            };

            for (id, _) in &expired {
                tx.execute(
                    "UPDATE probe_events SET status = 'error',
                     error = 'probe result timed out'
                     WHERE id = ?1",
                    params![id],
                )?;
            }

            tx.commit()?;
            Ok(expired)
        })
        .await
        .map_err(map_tr_err)
}
