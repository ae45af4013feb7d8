// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User operations.
//!
//! Users are created on first contact through the chat adapter and
//! activated when an invite is consumed; the admission API only ever reads
//! them via the session cookie's user id.

use linkmap_core::LinkmapError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::User;

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        display_name: row.get(2)?,
        status: row.get(3)?,
        invite_code: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const USER_COLUMNS: &str = "id, chat_id, display_name, status, invite_code, created_at, updated_at";

/// Create a user in `pending` status. Returns the new user id.
pub async fn create_user(
    db: &Database,
    chat_id: &str,
    display_name: Option<&str>,
) -> Result<i64, LinkmapError> {
    let chat_id = chat_id.to_string();
    let display_name = display_name.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (chat_id, display_name) VALUES (?1, ?2)",
                params![chat_id, display_name],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a user by id.
pub async fn get_user(db: &Database, id: i64) -> Result<Option<User>, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
            ))?;
            let user = stmt.query_row(params![id], row_to_user).optional()?;
            Ok(user)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a user by their external chat id.
pub async fn get_user_by_chat_id(
    db: &Database,
    chat_id: &str,
) -> Result<Option<User>, LinkmapError> {
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE chat_id = ?1"
            ))?;
            let user = stmt.query_row(params![chat_id], row_to_user).optional()?;
            Ok(user)
        })
        .await
        .map_err(map_tr_err)
}

/// Activate a pending user, recording the invite that was consumed.
pub async fn activate_user(
    db: &Database,
    id: i64,
    invite_code: &str,
) -> Result<(), LinkmapError> {
    let invite_code = invite_code.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET status = 'active', invite_code = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![invite_code, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
