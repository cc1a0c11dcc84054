// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Store Gateway (C2) — idempotent read/write of session and speech-task
//! records, expressed as a trait boundary.
//!
//! Session and speech-task persistence is a single trait (`StoreGateway`)
//! rather than an enum-of-backends, so a durable backend can be added
//! later as a drop-in implementor without touching any caller. This crate
//! ships one implementor, [`InMemoryStore`]; a durable SQL-backed
//! implementation is outside this crate's scope.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{SessionConfig, SessionRecord, SpeechTaskRecord, SpeechTaskStatus, SpeechTaskType};

#[async_trait]
pub trait StoreGateway: Send + Sync {
    async fn create_session(
        &self,
        owner_id: Option<Uuid>,
        initial_config: SessionConfig,
    ) -> Uuid;

    async fn load_session(&self, session_id: Uuid) -> Option<SessionRecord>;

    async fn save_session(&self, record: SessionRecord) -> bool;

    async fn create_speech_task(&self, session_id: &str, task_type: SpeechTaskType) -> Uuid;

    async fn update_speech_task(
        &self,
        task_id: Uuid,
        status: SpeechTaskStatus,
        progress: Option<HashMap<String, serde_json::Value>>,
        result: Option<HashMap<String, serde_json::Value>>,
        error: Option<String>,
    ) -> bool;

    async fn get_speech_task(&self, task_id: Uuid) -> Option<SpeechTaskRecord>;

    /// Remove speech task records older than `older_than_hours`, returning
    /// the count removed.
    async fn cleanup_speech_tasks(&self, older_than_hours: i64) -> usize;
}

/// In-process, `RwLock`-guarded in-memory store. Adequate for the
/// single-process scope; horizontal sharding across processes is out of
/// scope for this store.
#[derive(Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<Uuid, SessionRecord>>,
    speech_tasks: RwLock<HashMap<Uuid, SpeechTaskRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl StoreGateway for InMemoryStore {
    async fn create_session(&self, owner_id: Option<Uuid>, initial_config: SessionConfig) -> Uuid {
        let record = SessionRecord::new(Uuid::new_v4(), owner_id, initial_config);
        let id = record.session_id;
        self.sessions.write().await.insert(id, record);
        id
    }

    async fn load_session(&self, session_id: Uuid) -> Option<SessionRecord> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    async fn save_session(&self, mut record: SessionRecord) -> bool {
        record.updated_at = Utc::now();
        record.needs_save = false;
        self.sessions.write().await.insert(record.session_id, record);
        true
    }

    async fn create_speech_task(&self, session_id: &str, task_type: SpeechTaskType) -> Uuid {
        let record = SpeechTaskRecord::new(Uuid::new_v4(), session_id, task_type);
        let id = record.task_id;
        self.speech_tasks.write().await.insert(id, record);
        id
    }

    async fn update_speech_task(
        &self,
        task_id: Uuid,
        status: SpeechTaskStatus,
        progress: Option<HashMap<String, serde_json::Value>>,
        result: Option<HashMap<String, serde_json::Value>>,
        error: Option<String>,
    ) -> bool {
        let mut tasks = self.speech_tasks.write().await;
        let Some(task) = tasks.get_mut(&task_id) else {
            return false;
        };
        task.status = status;
        if let Some(p) = progress {
            task.progress = p;
        }
        if result.is_some() {
            task.result = result;
        }
        if error.is_some() {
            task.error = error;
        }
        task.updated_at = Utc::now();
        true
    }

    async fn get_speech_task(&self, task_id: Uuid) -> Option<SpeechTaskRecord> {
        self.speech_tasks.read().await.get(&task_id).cloned()
    }

    async fn cleanup_speech_tasks(&self, older_than_hours: i64) -> usize {
        let cutoff: DateTime<Utc> = Utc::now() - chrono::Duration::hours(older_than_hours);
        let mut tasks = self.speech_tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, t| t.updated_at >= cutoff);
        before - tasks.len()
    }
}
