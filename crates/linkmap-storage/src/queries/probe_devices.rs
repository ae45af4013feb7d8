// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Probe device operations. The bearer token is the sole capability a
//! probe needs to subscribe and post results.

use linkmap_core::LinkmapError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::ProbeDevice;

const DEVICE_COLUMNS: &str = "id, user_id, token, name, last_seen_at, created_at";

fn row_to_device(row: &rusqlite::Row) -> rusqlite::Result<ProbeDevice> {
    Ok(ProbeDevice {
        id: row.get(0)?,
        user_id: row.get(1)?,
        token: row.get(2)?,
        name: row.get(3)?,
        last_seen_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Register a new probe device with its freshly minted bearer token.
pub async fn create_probe_device(
    db: &Database,
    id: &str,
    user_id: i64,
    token: &str,
    name: Option<&str>,
) -> Result<(), LinkmapError> {
    let id = id.to_string();
    let token = token.to_string();
    let name = name.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO probe_devices (id, user_id, token, name) VALUES (?1, ?2, ?3, ?4)",
                params![id, user_id, token, name],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a device by bearer token. The auth path for all probe routes.
pub async fn get_probe_device_by_token(
    db: &Database,
    token: &str,
) -> Result<Option<ProbeDevice>, LinkmapError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DEVICE_COLUMNS} FROM probe_devices WHERE token = ?1"
            ))?;
            let device = stmt.query_row(params![token], row_to_device).optional()?;
            Ok(device)
        })
        .await
        .map_err(map_tr_err)
}

/// All devices enrolled by a user, newest first.
pub async fn list_probe_devices(
    db: &Database,
    user_id: i64,
) -> Result<Vec<ProbeDevice>, LinkmapError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DEVICE_COLUMNS} FROM probe_devices
                 WHERE user_id = ?1 ORDER BY created_at DESC"
            ))?;
            let devices = stmt
                .query_map(params![user_id], row_to_device)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(devices)
        })
        .await
        .map_err(map_tr_err)
}

/// Bump a device's `last_seen_at` to now.
pub async fn touch_probe_device(db: &Database, id: &str) -> Result<(), LinkmapError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE probe_devices SET last_seen_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users;

    async fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let user_id = users::create_user(&db, "tg-1", None).await.unwrap();
        (db, user_id)
    }

    #[tokio::test]
    async fn create_and_lookup_by_token() {
        let (db, user_id) = setup().await;
        create_probe_device(&db, "dev-1", user_id, "lmp_aabbcc", Some("laptop"))
            .await
            .unwrap();

        let device = get_probe_device_by_token(&db, "lmp_aabbcc").await.unwrap().unwrap();
        assert_eq!(device.id, "dev-1");
        assert_eq!(device.user_id, user_id);
        assert_eq!(device.name.as_deref(), Some("laptop"));
        assert!(device.last_seen_at.is_none());

        assert!(get_probe_device_by_token(&db, "lmp_wrong").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tokens_are_unique() {
        let (db, user_id) = setup().await;
        create_probe_device(&db, "dev-1", user_id, "lmp_dup", None).await.unwrap();
        let result = create_probe_device(&db, "dev-2", user_id, "lmp_dup", None).await;
        assert!(matches!(result, Err(LinkmapError::Constraint(_))));
    }

    #[tokio::test]
    async fn touch_updates_last_seen() {
        let (db, user_id) = setup().await;
        create_probe_device(&db, "dev-1", user_id, "lmp_tok", None).await.unwrap();

        touch_probe_device(&db, "dev-1").await.unwrap();
        let device = get_probe_device_by_token(&db, "lmp_tok").await.unwrap().unwrap();
        assert!(device.last_seen_at.is_some());
    }

    #[tokio::test]
    async fn list_devices_for_user() {
        let (db, user_id) = setup().await;
        let other = users::create_user(&db, "tg-2", None).await.unwrap();
        create_probe_device(&db, "dev-1", user_id, "lmp_a", None).await.unwrap();
        create_probe_device(&db, "dev-2", user_id, "lmp_b", None).await.unwrap();
        create_probe_device(&db, "dev-3", other, "lmp_c", None).await.unwrap();

        let devices = list_probe_devices(&db, user_id).await.unwrap();
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.user_id == user_id));
    }
}
