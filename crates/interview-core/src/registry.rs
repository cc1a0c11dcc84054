// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Session Registry (C7) — the process-wide map from session id to its
//! in-memory orchestrator, plus idle-session reclamation.
//!
//! The registry-wide lock is only ever held long enough to look up or
//! insert a map entry; all per-session work happens under that session's
//! own `tokio::sync::Mutex`, so two requests for different sessions never
//! block each other. This mirrors the concurrency shape of the original
//! manager (one lock per session, a short-lived registry lock to find
//! it), adapted to Rust's `Arc<Mutex<_>>`-per-entry idiom instead of a
//! dict-of-locks guarded by its own lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::model::SessionRecord;
use crate::orchestrator::Orchestrator;
use crate::store::StoreGateway;

#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStats {
    pub active_sessions: usize,
}

pub struct SessionRegistry {
    store: Arc<dyn StoreGateway>,
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<Orchestrator>>>>,
    last_activity: RwLock<HashMap<Uuid, Instant>>,
    /// One lock per session id, held only while that session's cold-load
    /// path (store read + `Orchestrator` construction) is in flight. A
    /// second concurrent `get_session_manager` for the same id blocks here
    /// instead of racing its own store load and insert — per §4.7/§9's
    /// "a second caller blocks on the per-session mutex while the first
    /// loads from the Store" / "§8 invariant 1: exactly one Manager
    /// instance per session id".
    load_locks: RwLock<HashMap<Uuid, Arc<Mutex<()>>>>,
    idle_timeout: Duration,
    cleanup_handle: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn StoreGateway>, idle_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            store,
            sessions: RwLock::new(HashMap::new()),
            last_activity: RwLock::new(HashMap::new()),
            load_locks: RwLock::new(HashMap::new()),
            idle_timeout,
            cleanup_handle: StdMutex::new(None),
        })
    }

    /// Create a brand new session, register it in memory, and persist
    /// the initial record.
    pub async fn create_session(&self, owner_id: Option<Uuid>, config: crate::model::SessionConfig) -> Uuid {
        let session_id = self.store.create_session(owner_id, config.clone()).await;
        let record = self.store.load_session(session_id).await.unwrap_or_else(|| {
            SessionRecord::new(session_id, owner_id, config)
        });
        let orchestrator = Arc::new(Mutex::new(Orchestrator::new(record)));
        self.sessions.write().await.insert(session_id, orchestrator);
        self.touch(session_id).await;
        session_id
    }

    /// Get the in-memory orchestrator for a session, loading it from the
    /// store on first access after a process restart or eviction.
    pub async fn get_session_manager(&self, session_id: Uuid) -> Option<Arc<Mutex<Orchestrator>>> {
        if let Some(existing) = self.sessions.read().await.get(&session_id).cloned() {
            self.touch(session_id).await;
            return Some(existing);
        }

        // Only a short registry-wide lock to find-or-insert the per-session
        // load lock; the store read and `Orchestrator` construction happen
        // under that per-session lock, never under this one.
        let load_lock = self
            .load_locks
            .write()
            .await
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _load_guard = load_lock.lock().await;

        // A concurrent caller may have finished the cold load while we were
        // waiting for `_load_guard`; re-check before hitting the store again.
        if let Some(existing) = self.sessions.read().await.get(&session_id).cloned() {
            self.touch(session_id).await;
            return Some(existing);
        }

        let record = self.store.load_session(session_id).await?;
        let orchestrator = Arc::new(Mutex::new(Orchestrator::new(record)));
        self.sessions.write().await.insert(session_id, orchestrator.clone());
        self.touch(session_id).await;
        Some(orchestrator)
    }

    /// Persist a session's current in-memory state. A no-op (returns
    /// `false`) if the session isn't currently loaded.
    pub async fn save_session(&self, session_id: Uuid) -> bool {
        let Some(manager) = self.sessions.read().await.get(&session_id).cloned() else {
            return false;
        };
        let record = manager.lock().await.record().clone();
        self.store.save_session(record).await
    }

    /// Refresh the idle timer without doing any other work, for
    /// lightweight keep-alive pings from an open WebSocket.
    pub async fn ping_session(&self, session_id: Uuid) -> bool {
        if self.sessions.read().await.contains_key(&session_id) {
            self.touch(session_id).await;
            true
        } else {
            self.store.load_session(session_id).await.is_some()
        }
    }

    /// Minutes remaining before the idle sweeper would reclaim this
    /// session, i.e. `idle_timeout − (now − last_access)` clamped to zero.
    /// Returns `None` if the session isn't tracked (never accessed, or
    /// already released) — distinct from [`Orchestrator::time_remaining_minutes`],
    /// which tracks the interview's own wall-clock budget.
    pub async fn get_time_remaining(&self, session_id: Uuid) -> Option<f64> {
        let last_access = *self.last_activity.read().await.get(&session_id)?;
        let elapsed = Instant::now().duration_since(last_access);
        let remaining = self.idle_timeout.saturating_sub(elapsed);
        Some(remaining.as_secs_f64() / 60.0)
    }

    pub fn idle_timeout_minutes(&self) -> f64 {
        self.idle_timeout.as_secs_f64() / 60.0
    }

    /// Reconcile and return the session's final-summary state. The
    /// background summary task (spawned from `Orchestrator::end_interview`)
    /// writes its result straight to the store, so a cached in-memory
    /// orchestrator can be stale with respect to it; this pulls the store's
    /// resolution in before answering, satisfying the "a subsequent poll
    /// persists the result through the registry" contract.
    pub async fn final_summary_status(&self, session_id: Uuid) -> Option<SessionRecord> {
        let Some(manager) = self.sessions.read().await.get(&session_id).cloned() else {
            return self.store.load_session(session_id).await;
        };

        let mut orchestrator = manager.lock().await;
        if orchestrator.record().summary_generating {
            if let Some(stored) = self.store.load_session(session_id).await {
                orchestrator.apply_summary_from_store(&stored);
            }
        }
        Some(orchestrator.record().clone())
    }

    /// Drop a session from memory without persisting it (the caller has
    /// already saved, or doesn't want to).
    pub async fn release_session(&self, session_id: Uuid) {
        self.sessions.write().await.remove(&session_id);
        self.last_activity.write().await.remove(&session_id);
        self.load_locks.write().await.remove(&session_id);
    }

    /// Persist, then remove a session from memory immediately, bypassing
    /// the idle timeout. A save failure prevents eviction — the session
    /// stays in memory so the next attempt can retry the write instead of
    /// silently losing in-memory state a real backend failed to durably
    /// commit.
    pub async fn cleanup_session_immediately(&self, session_id: Uuid) -> bool {
        let saved = self.save_session(session_id).await;
        if saved {
            self.release_session(session_id).await;
        }
        saved
    }

    /// Sweep sessions idle longer than the configured timeout: persist
    /// each, then drop it from memory. A session whose save fails is left
    /// in place and retried on the next sweep. Returns the count reclaimed.
    pub async fn cleanup_inactive_sessions(&self) -> usize {
        let now = Instant::now();
        let stale: Vec<Uuid> = {
            let last_activity = self.last_activity.read().await;
            last_activity
                .iter()
                .filter(|(_, t)| now.duration_since(**t) >= self.idle_timeout)
                .map(|(id, _)| *id)
                .collect()
        };

        let mut reclaimed = 0;
        for id in &stale {
            if self.cleanup_session_immediately(*id).await {
                reclaimed += 1;
            }
        }
        reclaimed
    }

    pub async fn memory_stats(&self) -> RegistryStats {
        RegistryStats { active_sessions: self.sessions.read().await.len() }
    }

    /// Spawn a background sweeper that calls [`cleanup_inactive_sessions`]
    /// on `interval`. Replaces any previously running sweeper.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) {
        let registry = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let reclaimed = registry.cleanup_inactive_sessions().await;
                if reclaimed > 0 {
                    tracing::debug!(reclaimed, "swept idle interview sessions");
                }
            }
        });

        if let Some(previous) = self.cleanup_handle.lock().expect("cleanup handle lock poisoned").replace(handle) {
            previous.abort();
        }
    }

    pub async fn stop_cleanup_task(&self) {
        let handle = self.cleanup_handle.lock().expect("cleanup handle lock poisoned").take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    async fn touch(&self, session_id: Uuid) {
        self.last_activity.write().await.insert(session_id, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SessionConfig, SessionRecord};
    use crate::store::{InMemoryStore, StoreGateway};

    fn registry() -> Arc<SessionRegistry> {
        SessionRegistry::new(InMemoryStore::new(), Duration::from_millis(20))
    }

    /// A store whose `save_session` always fails, for exercising the
    /// "a save failure prevents eviction" contract without depending on
    /// `InMemoryStore` (which never fails a write).
    struct AlwaysFailingSaveStore {
        inner: Arc<InMemoryStore>,
    }

    #[async_trait::async_trait]
    impl StoreGateway for AlwaysFailingSaveStore {
        async fn create_session(&self, owner_id: Option<Uuid>, initial_config: SessionConfig) -> Uuid {
            self.inner.create_session(owner_id, initial_config).await
        }

        async fn load_session(&self, session_id: Uuid) -> Option<SessionRecord> {
            self.inner.load_session(session_id).await
        }

        async fn save_session(&self, _record: SessionRecord) -> bool {
            false
        }

        async fn create_speech_task(
            &self,
            session_id: &str,
            task_type: crate::model::SpeechTaskType,
        ) -> Uuid {
            self.inner.create_speech_task(session_id, task_type).await
        }

        async fn update_speech_task(
            &self,
            task_id: Uuid,
            status: crate::model::SpeechTaskStatus,
            progress: Option<HashMap<String, serde_json::Value>>,
            result: Option<HashMap<String, serde_json::Value>>,
            error: Option<String>,
        ) -> bool {
            self.inner.update_speech_task(task_id, status, progress, result, error).await
        }

        async fn get_speech_task(&self, task_id: Uuid) -> Option<crate::model::SpeechTaskRecord> {
            self.inner.get_speech_task(task_id).await
        }

        async fn cleanup_speech_tasks(&self, older_than_hours: i64) -> usize {
            self.inner.cleanup_speech_tasks(older_than_hours).await
        }
    }

    #[tokio::test]
    async fn create_then_fetch_returns_same_orchestrator() {
        let reg = registry();
        let id = reg.create_session(None, SessionConfig::default()).await;
        let a = reg.get_session_manager(id).await.unwrap();
        let b = reg.get_session_manager(id).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn concurrent_cold_loads_of_the_same_session_yield_one_instance() {
        // Mirrors §8 invariant 1: the registry must never construct two
        // live `Orchestrator`s for the same session id, even when the
        // session starts out evicted from memory and several callers race
        // to rehydrate it at once.
        let reg = registry();
        let id = reg.create_session(None, SessionConfig::default()).await;
        reg.release_session(id).await;
        assert_eq!(reg.memory_stats().await.active_sessions, 0);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let reg = reg.clone();
            handles.push(tokio::spawn(async move { reg.get_session_manager(id).await.unwrap() }));
        }
        let mut managers = Vec::new();
        for h in handles {
            managers.push(h.await.unwrap());
        }

        let first = &managers[0];
        assert!(managers.iter().all(|m| Arc::ptr_eq(m, first)));
        assert_eq!(reg.memory_stats().await.active_sessions, 1);
    }

    #[tokio::test]
    async fn unknown_session_returns_none() {
        let reg = registry();
        assert!(reg.get_session_manager(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn save_session_persists_to_store() {
        let reg = registry();
        let id = reg.create_session(None, SessionConfig::default()).await;
        {
            let manager = reg.get_session_manager(id).await.unwrap();
            manager.lock().await.on_config_update(SessionConfig {
                job_role: "Updated Role".to_string(),
                ..SessionConfig::default()
            });
        }
        assert!(reg.save_session(id).await);
        reg.release_session(id).await;
        let manager = reg.get_session_manager(id).await.unwrap();
        assert_eq!(manager.lock().await.record().config.job_role, "Updated Role");
    }

    #[tokio::test]
    async fn cleanup_inactive_sessions_reclaims_after_idle_timeout() {
        let reg = registry();
        let id = reg.create_session(None, SessionConfig::default()).await;
        assert_eq!(reg.memory_stats().await.active_sessions, 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let reclaimed = reg.cleanup_inactive_sessions().await;
        assert_eq!(reclaimed, 1);
        assert_eq!(reg.memory_stats().await.active_sessions, 0);
    }

    #[tokio::test]
    async fn failed_save_prevents_eviction_and_is_retried_next_sweep() {
        let store = Arc::new(AlwaysFailingSaveStore { inner: InMemoryStore::new() });
        let reg = SessionRegistry::new(store, Duration::from_millis(20));
        let id = reg.create_session(None, SessionConfig::default()).await;
        assert_eq!(reg.memory_stats().await.active_sessions, 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let reclaimed = reg.cleanup_inactive_sessions().await;
        assert_eq!(reclaimed, 0);
        assert_eq!(reg.memory_stats().await.active_sessions, 1);

        assert!(!reg.cleanup_session_immediately(id).await);
        assert_eq!(reg.memory_stats().await.active_sessions, 1);
    }

    #[tokio::test]
    async fn ping_refreshes_activity_and_prevents_reclaim() {
        let reg = registry();
        let id = reg.create_session(None, SessionConfig::default()).await;

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(reg.ping_session(id).await);
        tokio::time::sleep(Duration::from_millis(15)).await;

        // 15ms since the ping, under the 20ms idle timeout: should survive.
        let reclaimed = reg.cleanup_inactive_sessions().await;
        assert_eq!(reclaimed, 0);
        assert_eq!(reg.memory_stats().await.active_sessions, 1);
    }

    #[tokio::test]
    async fn cleanup_session_immediately_bypasses_idle_timeout() {
        let reg = registry();
        let id = reg.create_session(None, SessionConfig::default()).await;
        assert!(reg.cleanup_session_immediately(id).await);
        assert_eq!(reg.memory_stats().await.active_sessions, 0);
    }

    #[tokio::test]
    async fn final_summary_status_picks_up_store_resolution_for_cached_session() {
        use crate::coach::Coach;
        use crate::search::FixedSearchProvider;
        use interview_model::MockProvider;
        use std::sync::Arc;

        let reg = registry();
        let id = reg.create_session(None, SessionConfig::default()).await;

        let manager = reg.get_session_manager(id).await.unwrap();
        {
            let mut orchestrator = manager.lock().await;
            orchestrator
                .end_interview(
                    reg.store.clone(),
                    Arc::new(MockProvider),
                    Arc::new(FixedSearchProvider { hits: vec![] }),
                    Arc::new(Coach::new()),
                )
                .await;
            assert!(orchestrator.record().summary_generating);
        }

        // Let the background task started by `end_interview` resolve in
        // the store; the cached orchestrator above never observes this
        // directly.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let status = reg.final_summary_status(id).await.unwrap();
        assert!(!status.summary_generating);
        assert!(status.final_summary.is_some());

        // The reconciliation must also have updated the cached copy, not
        // just the returned snapshot.
        assert!(!manager.lock().await.record().summary_generating);
    }
}
