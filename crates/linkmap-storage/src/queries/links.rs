// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Link operations: upsert, partial updates, ordered reads, vector and
//! BM25 search.

use linkmap_core::types::LinkStatus;
use linkmap_core::LinkmapError;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::{Link, LinkUpdate};
use crate::vector::{blob_to_vec, cosine_distance, score_from_distance, vec_to_blob};

const LINK_COLUMNS: &str = "id, user_id, url, title, description, image, site_name, og_type, \
     markdown, summary, insight, tags, images, related_ids, summary_vector, status, error, \
     created_at, updated_at";

pub(crate) fn row_to_link(row: &rusqlite::Row) -> rusqlite::Result<Link> {
    let tags: Option<String> = row.get(11)?;
    let images: Option<String> = row.get(12)?;
    let related_ids: Option<String> = row.get(13)?;
    let vector_blob: Option<Vec<u8>> = row.get(14)?;
    let status: String = row.get(15)?;

    Ok(Link {
        id: row.get(0)?,
        user_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        image: row.get(5)?,
        site_name: row.get(6)?,
        og_type: row.get(7)?,
        markdown: row.get(8)?,
        summary: row.get(9)?,
        insight: row.get(10)?,
        tags: tags.and_then(|t| serde_json::from_str(&t).ok()),
        images: images.and_then(|i| serde_json::from_str(&i).ok()),
        related_ids: related_ids
            .and_then(|r| serde_json::from_str(&r).ok())
            .unwrap_or_default(),
        summary_vector: vector_blob.map(|b| blob_to_vec(&b)),
        status: LinkStatus::from_str_value(&status),
        error: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

/// Idempotent link admission by `(user, url)`.
///
/// Returns `(link_id, was_existing)`. An existing row is reset to `pending`
/// with its error cleared; a missing row is inserted. SELECT-then-INSERT in
/// one transaction keeps the pair effectively unique under the pipeline's
/// single-admission path.
pub async fn upsert_link(
    db: &Database,
    user_id: i64,
    url: &str,
) -> Result<(i64, bool), LinkmapError> {
    let url = url.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM links WHERE user_id = ?1 AND url = ?2",
                    params![user_id, url],
                    |row| row.get(0),
                )
                .optional()?;

            let result = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE links SET status = 'pending', error = NULL,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![id],
                    )?;
                    (id, true)
                }
                None => {
                    tx.execute(
                        "INSERT INTO links (user_id, url) VALUES (?1, ?2)",
                        params![user_id, url],
                    )?;
                    (tx.last_insert_rowid(), false)
                }
            };

            tx.commit()?;
            Ok(result)
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically update the named fields of a link and bump `updated_at`.
pub async fn update_link(
    db: &Database,
    link_id: i64,
    update: LinkUpdate,
) -> Result<(), LinkmapError> {
    db.connection()
        .call(move |conn| {
            let mut sets: Vec<&'static str> = Vec::new();
            let mut values: Vec<Value> = Vec::new();

            if let Some(v) = update.title {
                sets.push("title = ?");
                values.push(Value::Text(v));
            }
            if let Some(v) = update.description {
                sets.push("description = ?");
                values.push(Value::Text(v));
            }
            if let Some(v) = update.image {
                sets.push("image = ?");
                values.push(Value::Text(v));
            }
            if let Some(v) = update.site_name {
                sets.push("site_name = ?");
                values.push(Value::Text(v));
            }
            if let Some(v) = update.og_type {
                sets.push("og_type = ?");
                values.push(Value::Text(v));
            }
            if let Some(v) = update.markdown {
                sets.push("markdown = ?");
                values.push(Value::Text(v));
            }
            if let Some(v) = update.summary {
                sets.push("summary = ?");
                values.push(Value::Text(v));
            }
            if let Some(v) = update.insight {
                sets.push("insight = ?");
                values.push(Value::Text(v));
            }
            if let Some(v) = update.tags {
                let json = serde_json::to_string(&v)
                    .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
                sets.push("tags = ?");
                values.push(Value::Text(json));
            }
            if let Some(v) = update.images {
                let json = serde_json::to_string(&v)
                    .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
                sets.push("images = ?");
                values.push(Value::Text(json));
            }
            if let Some(v) = update.summary_vector {
                sets.push("summary_vector = ?");
                values.push(Value::Blob(vec_to_blob(&v)));
            }
            if let Some(v) = update.status {
                sets.push("status = ?");
                values.push(Value::Text(v.as_str().to_string()));
            }
            if let Some(v) = update.error {
                match v {
                    Some(msg) => {
                        sets.push("error = ?");
                        values.push(Value::Text(msg));
                    }
                    None => sets.push("error = NULL"),
                }
            }

            if sets.is_empty() {
                return Ok(());
            }

            sets.push("updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')");
            let sql = format!("UPDATE links SET {} WHERE id = ?", sets.join(", "));
            values.push(Value::Integer(link_id));
            conn.execute(&sql, params_from_iter(values))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Nullable read by id.
pub async fn get_link(db: &Database, id: i64) -> Result<Option<Link>, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {LINK_COLUMNS} FROM links WHERE id = ?1"))?;
            let link = stmt.query_row(params![id], row_to_link).optional()?;
            Ok(link)
        })
        .await
        .map_err(map_tr_err)
}

/// Nullable read by `(user, url)`.
pub async fn get_link_by_url(
    db: &Database,
    user_id: i64,
    url: &str,
) -> Result<Option<Link>, LinkmapError> {
    let url = url.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LINK_COLUMNS} FROM links WHERE user_id = ?1 AND url = ?2"
            ))?;
            let link = stmt.query_row(params![user_id, url], row_to_link).optional()?;
            Ok(link)
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent links for a user, newest first.
pub async fn list_recent(
    db: &Database,
    user_id: i64,
    limit: usize,
) -> Result<Vec<Link>, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LINK_COLUMNS} FROM links WHERE user_id = ?1
                 ORDER BY id DESC LIMIT ?2"
            ))?;
            let links = stmt
                .query_map(params![user_id, limit as i64], row_to_link)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(links)
        })
        .await
        .map_err(map_tr_err)
}

/// Paginated listing, newest first.
pub async fn list_paginated(
    db: &Database,
    user_id: i64,
    limit: usize,
    offset: usize,
) -> Result<Vec<Link>, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LINK_COLUMNS} FROM links WHERE user_id = ?1
                 ORDER BY id DESC LIMIT ?2 OFFSET ?3"
            ))?;
            let links = stmt
                .query_map(params![user_id, limit as i64, offset as i64], row_to_link)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(links)
        })
        .await
        .map_err(map_tr_err)
}

/// All fully analyzed links for a user, newest first.
pub async fn list_analyzed(db: &Database, user_id: i64) -> Result<Vec<Link>, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LINK_COLUMNS} FROM links
                 WHERE user_id = ?1 AND status = 'analyzed' ORDER BY id DESC"
            ))?;
            let links = stmt
                .query_map(params![user_id], row_to_link)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(links)
        })
        .await
        .map_err(map_tr_err)
}

/// All failed links for a user, oldest first (retry processes them in
/// submission order).
pub async fn list_failed(db: &Database, user_id: i64) -> Result<Vec<Link>, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LINK_COLUMNS} FROM links
                 WHERE user_id = ?1 AND status = 'error' ORDER BY id ASC"
            ))?;
            let links = stmt
                .query_map(params![user_id], row_to_link)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(links)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a link row. Relation rows and probe events cascade via FK; see
/// `relations::remove_link_from_relations` for the cache scrub that the
/// deletion orchestration runs first.
pub async fn delete_link(db: &Database, id: i64) -> Result<bool, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let affected = conn.execute("DELETE FROM links WHERE id = ?1", params![id])?;
            Ok(affected > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Cosine similarity search over `summary_vector`.
///
/// Returns `(link_id, score)` pairs with `score = 1 / (1 + distance)`
/// rounded to two decimals, ordered by ascending distance, excluding
/// `exclude_id`, capped at `k`. Links without a vector are skipped; zero
/// candidates yield an empty result, not an error.
pub async fn vector_search(
    db: &Database,
    query: Vec<f32>,
    user_id: i64,
    exclude_id: i64,
    k: usize,
) -> Result<Vec<(i64, f64)>, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, summary_vector FROM links
                 WHERE user_id = ?1 AND id != ?2 AND summary_vector IS NOT NULL",
            )?;
            let candidates = stmt
                .query_map(params![user_id, exclude_id], |row| {
                    let id: i64 = row.get(0)?;
                    let blob: Vec<u8> = row.get(1)?;
                    Ok((id, blob_to_vec(&blob)))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut scored: Vec<(i64, f64, f64)> = candidates
                .into_iter()
                .filter(|(_, vec)| vec.len() == query.len())
                .map(|(id, vec)| {
                    let distance = cosine_distance(&query, &vec);
                    (id, distance, score_from_distance(distance))
                })
                .collect();

            // Ascending distance; ties broken by lower id for determinism.
            scored.sort_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            scored.truncate(k);

            Ok(scored.into_iter().map(|(id, _, score)| (id, score)).collect())
        })
        .await
        .map_err(map_tr_err)
}

/// BM25 keyword search over `{title, summary, markdown}` via FTS5.
///
/// Returns ranked link ids, best match first.
pub async fn bm25_search(
    db: &Database,
    query: &str,
    user_id: i64,
    k: usize,
) -> Result<Vec<i64>, LinkmapError> {
    let query = query.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT l.id FROM links_fts
                 JOIN links l ON l.id = links_fts.rowid
                 WHERE links_fts MATCH ?1 AND l.user_id = ?2
                 ORDER BY bm25(links_fts) LIMIT ?3",
            )?;
            let ids = stmt
                .query_map(params![query, user_id, k as i64], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}
