// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The store gateway: every read and write in the system goes through
//! [`Store`]. No other component opens a connection to the backing store.

use linkmap_core::types::{ProbeEventStatus, UrlKind};
use linkmap_core::LinkmapError;

use crate::database::Database;
use crate::models::{
    DeviceAuthRequest, Link, LinkUpdate, ProbeDevice, ProbeEvent, TaskRow, User,
};
use crate::queries;

/// Owns the database handle and exposes the typed operations of the store
/// gateway. Cheap to share behind an `Arc`.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open (or create) the store at the given path and run migrations.
    pub async fn open(path: &str) -> Result<Self, LinkmapError> {
        Ok(Self {
            db: Database::open(path).await?,
        })
    }

    /// In-memory store for tests.
    pub async fn open_in_memory() -> Result<Self, LinkmapError> {
        Ok(Self {
            db: Database::open_in_memory().await?,
        })
    }

    /// Checkpoint and release the WAL on graceful shutdown.
    pub async fn close(&self) -> Result<(), LinkmapError> {
        self.db.close().await
    }

    // --- Users ---

    pub async fn create_user(
        &self,
        chat_id: &str,
        display_name: Option<&str>,
    ) -> Result<i64, LinkmapError> {
        queries::users::create_user(&self.db, chat_id, display_name).await
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, LinkmapError> {
        queries::users::get_user(&self.db, id).await
    }

    pub async fn get_user_by_chat_id(&self, chat_id: &str) -> Result<Option<User>, LinkmapError> {
        queries::users::get_user_by_chat_id(&self.db, chat_id).await
    }

    pub async fn activate_user(&self, id: i64, invite_code: &str) -> Result<(), LinkmapError> {
        queries::users::activate_user(&self.db, id, invite_code).await
    }

    // --- Links ---

    pub async fn upsert_link(&self, user_id: i64, url: &str) -> Result<(i64, bool), LinkmapError> {
        queries::links::upsert_link(&self.db, user_id, url).await
    }

    pub async fn update_link(&self, link_id: i64, update: LinkUpdate) -> Result<(), LinkmapError> {
        queries::links::update_link(&self.db, link_id, update).await
    }

    pub async fn get_link(&self, id: i64) -> Result<Option<Link>, LinkmapError> {
        queries::links::get_link(&self.db, id).await
    }

    pub async fn get_link_by_url(
        &self,
        user_id: i64,
        url: &str,
    ) -> Result<Option<Link>, LinkmapError> {
        queries::links::get_link_by_url(&self.db, user_id, url).await
    }

    pub async fn list_recent(&self, user_id: i64, limit: usize) -> Result<Vec<Link>, LinkmapError> {
        queries::links::list_recent(&self.db, user_id, limit).await
    }

    pub async fn list_paginated(
        &self,
        user_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Link>, LinkmapError> {
        queries::links::list_paginated(&self.db, user_id, limit, offset).await
    }

    pub async fn list_analyzed(&self, user_id: i64) -> Result<Vec<Link>, LinkmapError> {
        queries::links::list_analyzed(&self.db, user_id).await
    }

    pub async fn list_failed(&self, user_id: i64) -> Result<Vec<Link>, LinkmapError> {
        queries::links::list_failed(&self.db, user_id).await
    }

    pub async fn delete_link(&self, id: i64) -> Result<bool, LinkmapError> {
        queries::links::delete_link(&self.db, id).await
    }

    pub async fn vector_search(
        &self,
        query: Vec<f32>,
        user_id: i64,
        exclude_id: i64,
        k: usize,
    ) -> Result<Vec<(i64, f64)>, LinkmapError> {
        queries::links::vector_search(&self.db, query, user_id, exclude_id, k).await
    }

    pub async fn bm25_search(
        &self,
        query: &str,
        user_id: i64,
        k: usize,
    ) -> Result<Vec<i64>, LinkmapError> {
        queries::links::bm25_search(&self.db, query, user_id, k).await
    }

    // --- Relations ---

    pub async fn save_relations(
        &self,
        link_id: i64,
        pairs: Vec<(i64, f64)>,
    ) -> Result<(), LinkmapError> {
        queries::relations::save_relations(&self.db, link_id, pairs).await
    }

    pub async fn get_relations(&self, link_id: i64) -> Result<Vec<(i64, f64)>, LinkmapError> {
        queries::relations::get_relations(&self.db, link_id).await
    }

    pub async fn remove_link_from_relations(&self, link_id: i64) -> Result<usize, LinkmapError> {
        queries::relations::remove_link_from_relations(&self.db, link_id).await
    }

    // --- Probe events ---

    pub async fn create_probe_event(
        &self,
        id: &str,
        user_id: i64,
        link_id: i64,
        url: &str,
        url_kind: UrlKind,
    ) -> Result<(), LinkmapError> {
        queries::probe_events::create_probe_event(&self.db, id, user_id, link_id, url, url_kind)
            .await
    }

    pub async fn get_probe_event(&self, id: &str) -> Result<Option<ProbeEvent>, LinkmapError> {
        queries::probe_events::get_probe_event(&self.db, id).await
    }

    pub async fn set_probe_event_status(
        &self,
        id: &str,
        status: ProbeEventStatus,
        result: Option<String>,
        error: Option<String>,
    ) -> Result<(), LinkmapError> {
        queries::probe_events::set_probe_event_status(&self.db, id, status, result, error).await
    }

    pub async fn list_pending_probe_events(
        &self,
        user_id: i64,
    ) -> Result<Vec<ProbeEvent>, LinkmapError> {
        queries::probe_events::list_pending_probe_events(&self.db, user_id).await
    }

    pub async fn count_pending_probe_events(&self, user_id: i64) -> Result<i64, LinkmapError> {
        queries::probe_events::count_pending_probe_events(&self.db, user_id).await
    }

    pub async fn expire_probe_events_before(
        &self,
        cutoff: &str,
    ) -> Result<Vec<(String, i64)>, LinkmapError> {
        queries::probe_events::expire_probe_events_before(&self.db, cutoff).await
    }

    // --- Probe devices ---

    pub async fn create_probe_device(
        &self,
        id: &str,
        user_id: i64,
        token: &str,
        name: Option<&str>,
    ) -> Result<(), LinkmapError> {
        queries::probe_devices::create_probe_device(&self.db, id, user_id, token, name).await
    }

    pub async fn get_probe_device_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ProbeDevice>, LinkmapError> {
        queries::probe_devices::get_probe_device_by_token(&self.db, token).await
    }

    pub async fn list_probe_devices(&self, user_id: i64) -> Result<Vec<ProbeDevice>, LinkmapError> {
        queries::probe_devices::list_probe_devices(&self.db, user_id).await
    }

    pub async fn touch_probe_device(&self, id: &str) -> Result<(), LinkmapError> {
        queries::probe_devices::touch_probe_device(&self.db, id).await
    }

    // --- Device auth ---

    pub async fn create_device_auth(
        &self,
        device_code: &str,
        user_code: &str,
        expires_at: &str,
    ) -> Result<(), LinkmapError> {
        queries::device_auth::create_device_auth(&self.db, device_code, user_code, expires_at)
            .await
    }

    pub async fn get_device_auth(
        &self,
        device_code: &str,
    ) -> Result<Option<DeviceAuthRequest>, LinkmapError> {
        queries::device_auth::get_device_auth(&self.db, device_code).await
    }

    pub async fn get_device_auth_by_user_code(
        &self,
        user_code: &str,
    ) -> Result<Option<DeviceAuthRequest>, LinkmapError> {
        queries::device_auth::get_device_auth_by_user_code(&self.db, user_code).await
    }

    pub async fn authorize_device_auth(
        &self,
        device_code: &str,
        user_id: i64,
    ) -> Result<(), LinkmapError> {
        queries::device_auth::authorize_device_auth(&self.db, device_code, user_id).await
    }

    pub async fn expire_device_auth(&self, device_code: &str) -> Result<(), LinkmapError> {
        queries::device_auth::expire_device_auth(&self.db, device_code).await
    }

    // --- Tasks ---

    pub async fn create_task(
        &self,
        queue_name: &str,
        kind: &str,
        params_json: &str,
        max_attempts: i32,
        retry_strategy_json: &str,
    ) -> Result<i64, LinkmapError> {
        queries::tasks::create_task(
            &self.db,
            queue_name,
            kind,
            params_json,
            max_attempts,
            retry_strategy_json,
        )
        .await
    }

    pub async fn claim_next_task(
        &self,
        queue_name: &str,
        lease_secs: u64,
    ) -> Result<Option<TaskRow>, LinkmapError> {
        queries::tasks::claim_next(&self.db, queue_name, lease_secs).await
    }

    pub async fn complete_task(&self, id: i64, result_json: &str) -> Result<(), LinkmapError> {
        queries::tasks::complete_task(&self.db, id, result_json).await
    }

    pub async fn fail_task(
        &self,
        id: i64,
        error: &str,
        not_before: Option<String>,
    ) -> Result<linkmap_core::types::TaskState, LinkmapError> {
        queries::tasks::fail_task(&self.db, id, error, not_before).await
    }

    pub async fn release_expired_tasks(&self, queue_name: &str) -> Result<usize, LinkmapError> {
        queries::tasks::release_expired(&self.db, queue_name).await
    }

    pub async fn get_task(&self, id: i64) -> Result<Option<TaskRow>, LinkmapError> {
        queries::tasks::get_task(&self.db, id).await
    }

    pub async fn cancel_task(&self, id: i64) -> Result<bool, LinkmapError> {
        queries::tasks::cancel_task(&self.db, id).await
    }

    pub async fn get_step(
        &self,
        task_id: i64,
        step_name: &str,
    ) -> Result<Option<String>, LinkmapError> {
        queries::tasks::get_step(&self.db, task_id, step_name).await
    }

    pub async fn put_step(
        &self,
        task_id: i64,
        step_name: &str,
        value_json: &str,
    ) -> Result<(), LinkmapError> {
        queries::tasks::put_step(&self.db, task_id, step_name, value_json).await
    }
}
