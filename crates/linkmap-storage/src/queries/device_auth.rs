// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device-code enrollment request operations.

use linkmap_core::types::DeviceAuthStatus;
use linkmap_core::LinkmapError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::DeviceAuthRequest;

const AUTH_COLUMNS: &str = "device_code, user_code, user_id, status, expires_at, created_at";

fn row_to_auth(row: &rusqlite::Row) -> rusqlite::Result<DeviceAuthRequest> {
    let status: String = row.get(3)?;
    Ok(DeviceAuthRequest {
        device_code: row.get(0)?,
        user_code: row.get(1)?,
        user_id: row.get(2)?,
        status: DeviceAuthStatus::from_str_value(&status),
        expires_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Record a new enrollment request in `pending` status.
pub async fn create_device_auth(
    db: &Database,
    device_code: &str,
    user_code: &str,
    expires_at: &str,
) -> Result<(), LinkmapError> {
    let device_code = device_code.to_string();
    let user_code = user_code.to_string();
    let expires_at = expires_at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO device_auth_requests (device_code, user_code, expires_at)
                 VALUES (?1, ?2, ?3)",
                params![device_code, user_code, expires_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Nullable read by device code (the probe's polling key).
pub async fn get_device_auth(
    db: &Database,
    device_code: &str,
) -> Result<Option<DeviceAuthRequest>, LinkmapError> {
    let device_code = device_code.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUTH_COLUMNS} FROM device_auth_requests WHERE device_code = ?1"
            ))?;
            let auth = stmt.query_row(params![device_code], row_to_auth).optional()?;
            Ok(auth)
        })
        .await
        .map_err(map_tr_err)
}

/// Nullable read by user code (the verification page's lookup key).
pub async fn get_device_auth_by_user_code(
    db: &Database,
    user_code: &str,
) -> Result<Option<DeviceAuthRequest>, LinkmapError> {
    let user_code = user_code.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUTH_COLUMNS} FROM device_auth_requests WHERE user_code = ?1"
            ))?;
            let auth = stmt.query_row(params![user_code], row_to_auth).optional()?;
            Ok(auth)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a request authorized and attach the authorizing user.
pub async fn authorize_device_auth(
    db: &Database,
    device_code: &str,
    user_id: i64,
) -> Result<(), LinkmapError> {
    let device_code = device_code.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE device_auth_requests SET status = 'authorized', user_id = ?1
                 WHERE device_code = ?2",
                params![user_id, device_code],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a request expired.
pub async fn expire_device_auth(db: &Database, device_code: &str) -> Result<(), LinkmapError> {
    let device_code = device_code.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE device_auth_requests SET status = 'expired' WHERE device_code = ?1",
                params![device_code],
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
    async fn create_and_lookup_both_keys() {
        let (db, _) = setup().await;
        create_device_auth(&db, "deadbeef", "ABCD-EFGH", "2999-01-01T00:00:00.000Z")
            .await
            .unwrap();

        let by_device = get_device_auth(&db, "deadbeef").await.unwrap().unwrap();
        assert_eq!(by_device.user_code, "ABCD-EFGH");
        assert_eq!(by_device.status, DeviceAuthStatus::Pending);
        assert!(by_device.user_id.is_none());

        let by_user = get_device_auth_by_user_code(&db, "ABCD-EFGH").await.unwrap().unwrap();
        assert_eq!(by_user.device_code, "deadbeef");

        assert!(get_device_auth(&db, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn authorize_attaches_user() {
        let (db, user_id) = setup().await;
        create_device_auth(&db, "deadbeef", "ABCD-EFGH", "2999-01-01T00:00:00.000Z")
            .await
            .unwrap();

        authorize_device_auth(&db, "deadbeef", user_id).await.unwrap();

        let auth = get_device_auth(&db, "deadbeef").await.unwrap().unwrap();
        assert_eq!(auth.status, DeviceAuthStatus::Authorized);
        assert_eq!(auth.user_id, Some(user_id));
    }

    #[tokio::test]
    async fn expire_transitions_status() {
        let (db, _) = setup().await;
        create_device_auth(&db, "deadbeef", "ABCD-EFGH", "2020-01-01T00:00:00.000Z")
            .await
            .unwrap();

        expire_device_auth(&db, "deadbeef").await.unwrap();
        let auth = get_device_auth(&db, "deadbeef").await.unwrap().unwrap();
        assert_eq!(auth.status, DeviceAuthStatus::Expired);
    }

    #[tokio::test]
    async fn user_codes_are_unique() {
        let (db, _) = setup().await;
        create_device_auth(&db, "code-1", "ABCD-EFGH", "2999-01-01T00:00:00.000Z")
            .await
            .unwrap();
        let result =
            create_device_auth(&db, "code-2", "ABCD-EFGH", "2999-01-01T00:00:00.000Z").await;
        assert!(matches!(result, Err(LinkmapError::Constraint(_))));
    }
}
