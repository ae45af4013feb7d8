// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Related-links index: single-edge storage with union reads.
//!
//! A relation between two links is stored as one row regardless of which
//! side computed it; reads union outgoing and incoming edges. This halves
//! the writes at the cost of union logic on the (rarer) reads.

use std::collections::HashMap;

use linkmap_core::LinkmapError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};

/// Maximum relations returned per link.
const MAX_RELATIONS: usize = 5;

/// Replace the set of outgoing relations for `link_id` atomically.
///
/// Pairs are assumed already filtered by threshold and truncated by the
/// caller. When the reversed edge `(other, link_id)` already exists its
/// score is updated in place, keeping at most one row per unordered pair.
/// The owning link's `related_ids` cache is rewritten in the same
/// transaction.
pub async fn save_relations(
    db: &Database,
    link_id: i64,
    pairs: Vec<(i64, f64)>,
) -> Result<(), LinkmapError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "DELETE FROM link_relations WHERE link_id = ?1",
                params![link_id],
            )?;

            for (other_id, score) in &pairs {
                let reversed: Option<i64> = tx
                    .query_row(
                        "SELECT 1 FROM link_relations WHERE link_id = ?1 AND related_id = ?2",
                        params![other_id, link_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                if reversed.is_some() {
                    tx.execute(
                        "UPDATE link_relations SET score = ?1
                         WHERE link_id = ?2 AND related_id = ?3",
                        params![score, other_id, link_id],
                    )?;
                } else {
                    tx.execute(
                        "INSERT INTO link_relations (link_id, related_id, score)
                         VALUES (?1, ?2, ?3)",
                        params![link_id, other_id, score],
                    )?;
                }
            }

            let ids: Vec<i64> = pairs.iter().map(|(id, _)| *id).collect();
            let cache = serde_json::to_string(&ids)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            tx.execute(
                "UPDATE links SET related_ids = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![cache, link_id],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Union of outgoing and incoming relations for `link_id`.
///
/// Deduplicated by the other endpoint keeping the maximum score, sorted by
/// score descending (tie: lower id first), capped at 5.
pub async fn get_relations(
    db: &Database,
    link_id: i64,
) -> Result<Vec<(i64, f64)>, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT related_id, score FROM link_relations WHERE link_id = ?1
                 UNION ALL
                 SELECT link_id, score FROM link_relations WHERE related_id = ?1",
            )?;
            let edges = stmt
                .query_map(params![link_id], |row| {
                    let other: i64 = row.get(0)?;
                    let score: f64 = row.get(1)?;
                    Ok((other, score))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut best: HashMap<i64, f64> = HashMap::new();
            for (other, score) in edges {
                let entry = best.entry(other).or_insert(score);
                if score > *entry {
                    *entry = score;
                }
            }

            let mut merged: Vec<(i64, f64)> = best.into_iter().collect();
            merged.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            merged.truncate(MAX_RELATIONS);
            Ok(merged)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete every relation row touching `link_id` and scrub stale references
/// from other links' `related_ids` caches.
///
/// Returns how many remote link rows had references scrubbed, for audit.
pub async fn remove_link_from_relations(
    db: &Database,
    link_id: i64,
) -> Result<usize, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "DELETE FROM link_relations WHERE link_id = ?1 OR related_id = ?1",
                params![link_id],
            )?;

            // Best-effort cache scrub: find links whose cached id list
            // mentions the deleted link and rewrite it without the entry.
            let stale: Vec<(i64, String)> = {
                let mut stmt = tx.prepare(
                    "SELECT id, related_ids FROM links
                     WHERE related_ids IS NOT NULL AND id != ?1",
                )?;
                let rows = stmt
                    .query_map(params![link_id], |row| {
                        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            };

            let mut scrubbed = 0usize;
            for (id, cache) in stale {
                let Ok(mut ids) = serde_json::from_str::<Vec<i64>>(&cache) else {
                    continue;
                };
                let before = ids.len();
                ids.retain(|other| *other != link_id);
                if ids.len() != before {
                    let updated = serde_json::to_string(&ids)
                        .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
                    tx.execute(
                        "UPDATE links SET related_ids = ?1,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?2",
                        params![updated, id],
                    )?;
                    scrubbed += 1;
                }
            }

            tx.commit()?;
            Ok(scrubbed)
        })
        .await
        .map_err(map_tr_err)
}
