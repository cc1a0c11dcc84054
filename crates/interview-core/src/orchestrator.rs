// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Session Orchestrator (C6) — wires the Interviewer, Coach, and Time
//! Manager together for a single session and owns its persisted record.
//!
//! Grounded on `api/agent_api.py`'s `/message` and `/end` handlers: each
//! processed message is saved without blocking the response
//! (`asyncio.create_task` there, `tokio::spawn` here), and ending an
//! interview returns immediately with a closing message while the final
//! summary is generated in the background and picked up later by polling
//! (§6's `/final-summary-status`, implemented in the gateway).

use std::sync::Arc;

use uuid::Uuid;

use interview_model::LlmProvider;

use crate::coach::Coach;
use crate::constants::INTERVIEW_CONCLUSION_TEXT;
use crate::error::{CoreError, CoreResult};
use crate::interviewer::Interviewer;
use crate::model::{
    AgentResponse, Message, ResponseType, SessionConfig, SessionRecord, SessionStatus, Summary,
};
use crate::search::SearchProvider;
use crate::store::StoreGateway;
use crate::time_manager::TimeManager;

/// Per-session business logic, held behind the registry's per-session
/// mutex. Not `Clone`: exactly one orchestrator owns a given session's
/// in-memory interviewer/time-manager state at a time.
pub struct Orchestrator {
    record: SessionRecord,
    interviewer: Interviewer,
    time_manager: Option<TimeManager>,
}

impl Orchestrator {
    pub fn new(record: SessionRecord) -> Self {
        let time_manager = record
            .config
            .time_based
            .then(|| record.config.interview_duration_minutes)
            .flatten()
            .map(TimeManager::new);

        Self {
            interviewer: Interviewer::restore(
                record.config.clone(),
                record.interviewer_state.clone(),
                record.question_bank.clone(),
            ),
            record,
            time_manager,
        }
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn into_record(self) -> SessionRecord {
        self.record
    }

    pub fn session_id(&self) -> Uuid {
        self.record.session_id
    }

    /// Start the interview: generate the question bank, kick off the
    /// time manager if this session is time-based, and return the
    /// introduction turn.
    pub async fn start(&mut self, provider: &dyn LlmProvider) -> CoreResult<AgentResponse> {
        if let Some(tm) = self.time_manager.as_mut() {
            tm.start();
        }
        let response = self.interviewer.initialize(provider).await?;
        self.record.history.push(Message::assistant(
            response.content.clone(),
            response.agent,
            response.response_type,
        ));
        self.record.interviewer_state = self.interviewer.state().clone();
        self.record.question_bank = self.interviewer.question_bank().to_vec();
        self.record.needs_save = true;
        Ok(response)
    }

    /// Process one candidate turn: run the interviewer's next-action
    /// decision, attach coach feedback for the previous question, and
    /// update the persisted record in place. The caller is responsible
    /// for persisting via the store afterward (§9 Decision 1: every
    /// write is a whole-record replace, so batching several turns before
    /// a save is safe and simply means the same state is written twice).
    pub async fn process_message(
        &mut self,
        provider: &dyn LlmProvider,
        coach: &Coach,
        user_text: &str,
    ) -> CoreResult<AgentResponse> {
        if self.record.status != SessionStatus::Active {
            return Err(CoreError::InvalidInput("session is not active".to_string()));
        }

        let previous_question = self.interviewer.state().current_question.clone();

        self.record.history.push(Message::user(user_text));
        self.record.stats.turn_count += 1;

        let time_context = self.time_manager.as_mut().map(|tm| tm.time_context().0);
        let response = self
            .interviewer
            .process(provider, &self.record.history, user_text, time_context.as_ref())
            .await?;

        if let Some(question) = previous_question {
            let feedback = coach.evaluate(provider, &self.record.config.job_role, &question, user_text).await;
            self.record.per_turn_feedback.push(feedback);
        }

        self.record.history.push(Message::assistant(
            response.content.clone(),
            response.agent,
            response.response_type,
        ));
        self.record.interviewer_state = self.interviewer.state().clone();
        self.record.needs_save = true;

        if response.response_type == ResponseType::Closing {
            self.record.status = SessionStatus::Completed;
        }

        Ok(response)
    }

    /// Mark the session completed and kick off background final-summary
    /// generation, returning the closing message immediately. The final
    /// summary is never available synchronously from this call; clients
    /// poll the status endpoint instead.
    pub async fn end_interview(
        &mut self,
        store: Arc<dyn StoreGateway>,
        provider: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        coach: Arc<Coach>,
    ) -> String {
        let already_generating = self.record.summary_generating;

        self.record.status = SessionStatus::Completed;
        if let Some(tm) = self.time_manager.as_mut() {
            tm.stop();
        }
        self.record.summary_generating = true;
        self.record.needs_save = true;

        // §8 invariant 5: at most one background summary task per end
        // event. A second `end_interview` call on an already-generating
        // session (client retry, duplicate request) must not spawn another.
        if !already_generating {
            let session_id = self.record.session_id;
            let job_role = self.record.config.job_role.clone();
            let history = self.record.history.clone();
            let feedback = self.record.per_turn_feedback.clone();

            tokio::spawn(async move {
                let _guard = FinalizeOnDrop { session_id, store: store.clone() };
                let summary = coach
                    .final_summary(provider.as_ref(), search.as_ref(), &job_role, &history, &feedback)
                    .await;
                if let Some(mut record) = store.load_session(session_id).await {
                    record.final_summary = Some(summary);
                    record.summary_generating = false;
                    record.resource_generation_completed_at = Some(chrono::Utc::now());
                    store.save_session(record).await;
                }
            });
        }

        INTERVIEW_CONCLUSION_TEXT.to_string()
    }

    /// Pull the background summary task's result in from the store if it
    /// has resolved there but this in-memory copy hasn't caught up yet —
    /// the task writes straight to the store (§4.6), bypassing whichever
    /// orchestrator instance the registry happens to be holding.
    pub fn apply_summary_from_store(&mut self, stored: &SessionRecord) {
        if self.record.summary_generating && !stored.summary_generating {
            self.record.summary_generating = false;
            self.record.final_summary = stored.final_summary.clone();
            self.record.resource_generation_completed_at = stored.resource_generation_completed_at;
            self.record.status = stored.status;
        }
    }

    /// Full reset back to a fresh session using the same config, as if
    /// the candidate had just connected.
    pub fn reset_session(&mut self) {
        let config = self.record.config.clone();
        let owner = self.record.owner_user_id;
        let session_id = self.record.session_id;

        self.interviewer = Interviewer::new(config.clone());
        self.time_manager = config
            .time_based
            .then(|| config.interview_duration_minutes)
            .flatten()
            .map(TimeManager::new);

        self.record = SessionRecord::new(session_id, owner, config);
    }

    pub fn on_config_update(&mut self, config: SessionConfig) {
        self.interviewer.on_config_update(config.clone());
        self.record.config = config;
        self.record.needs_save = true;
    }

    pub fn time_remaining_minutes(&mut self) -> Option<f64> {
        self.time_manager.as_mut().map(|tm| tm.time_context().0.remaining_minutes)
    }
}

/// Panic safety net for the background summary task: if the task above
/// is cancelled or panics before it reaches its own cleanup, this clears
/// the stuck `summary_generating` flag and stores a placeholder error
/// summary so polling clients don't wait forever.
struct FinalizeOnDrop {
    session_id: Uuid,
    store: Arc<dyn StoreGateway>,
}

impl Drop for FinalizeOnDrop {
    fn drop(&mut self) {
        let session_id = self.session_id;
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Some(mut record) = store.load_session(session_id).await {
                if record.summary_generating {
                    record.summary_generating = false;
                    record.final_summary.get_or_insert_with(|| error_summary(
                        "Summary generation was interrupted before it could complete.",
                    ));
                    store.save_session(record).await;
                }
            }
        });
    }
}

fn error_summary(message: &str) -> Summary {
    Summary {
        patterns_tendencies: String::new(),
        strengths: String::new(),
        weaknesses: String::new(),
        improvement_focus_areas: String::new(),
        recommended_resources: Vec::new(),
        error: Some(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionConfig;
    use crate::search::FixedSearchProvider;
    use crate::store::InMemoryStore;
    use interview_model::MockProvider;

    fn test_config() -> SessionConfig {
        SessionConfig { target_question_count: 3, time_based: false, ..SessionConfig::default() }
    }

    #[tokio::test]
    async fn start_then_process_message_updates_record_and_stats() {
        let record = SessionRecord::new(Uuid::new_v4(), None, test_config());
        let mut orchestrator = Orchestrator::new(record);
        let provider = MockProvider;
        let coach = Coach::new();

        orchestrator.start(&provider).await.unwrap();
        assert_eq!(orchestrator.record().history.len(), 1);

        orchestrator.process_message(&provider, &coach, "my answer").await.unwrap();
        assert_eq!(orchestrator.record().stats.turn_count, 1);
        assert_eq!(orchestrator.record().per_turn_feedback.len(), 1);
        assert!(orchestrator.record().history.len() >= 3);
    }

    #[tokio::test]
    async fn process_message_rejects_when_session_not_active() {
        let mut record = SessionRecord::new(Uuid::new_v4(), None, test_config());
        record.status = SessionStatus::Completed;
        let mut orchestrator = Orchestrator::new(record);
        let provider = MockProvider;
        let coach = Coach::new();
        let result = orchestrator.process_message(&provider, &coach, "answer").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn end_interview_returns_immediately_and_flags_summary_generating() {
        let record = SessionRecord::new(Uuid::new_v4(), None, test_config());
        let session_id = record.session_id;
        let mut orchestrator = Orchestrator::new(record);

        let store = InMemoryStore::new();
        // Pre-seed the store with this session so the spawned task finds it.
        store.save_session(orchestrator.record().clone()).await;

        let provider: Arc<dyn LlmProvider> = Arc::new(MockProvider);
        let search: Arc<dyn SearchProvider> = Arc::new(FixedSearchProvider { hits: vec![] });
        let coach = Arc::new(Coach::new());

        let message = orchestrator
            .end_interview(store.clone(), provider, search, coach)
            .await;

        assert_eq!(message, INTERVIEW_CONCLUSION_TEXT);
        assert!(orchestrator.record().summary_generating);

        // Give the spawned task a chance to run and clear the flag.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let reloaded = store.load_session(session_id).await.unwrap();
        assert!(!reloaded.summary_generating);
        assert!(reloaded.final_summary.is_some());
    }

    #[tokio::test]
    async fn end_interview_does_not_reschedule_while_already_generating() {
        let record = SessionRecord::new(Uuid::new_v4(), None, test_config());
        let mut orchestrator = Orchestrator::new(record);

        let store = InMemoryStore::new();
        store.save_session(orchestrator.record().clone()).await;

        let provider: Arc<dyn LlmProvider> = Arc::new(MockProvider);
        let search: Arc<dyn SearchProvider> = Arc::new(FixedSearchProvider { hits: vec![] });
        let coach = Arc::new(Coach::new());

        // First call spawns the background task and flips the flag.
        orchestrator
            .end_interview(store.clone(), provider.clone(), search.clone(), coach.clone())
            .await;
        assert!(orchestrator.record().summary_generating);

        // A second call before the first resolves must not spawn another
        // background task — if it did, the store write race below would
        // be exercised twice and this test would be flaky rather than
        // reliably green.
        orchestrator.end_interview(store.clone(), provider, search, coach).await;
        assert!(orchestrator.record().summary_generating);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let reloaded = store.load_session(orchestrator.session_id()).await.unwrap();
        assert!(!reloaded.summary_generating);
        assert!(reloaded.final_summary.is_some());
    }

    #[tokio::test]
    async fn reset_session_clears_history_and_reactivates() {
        let record = SessionRecord::new(Uuid::new_v4(), None, test_config());
        let mut orchestrator = Orchestrator::new(record);
        let provider = MockProvider;
        orchestrator.start(&provider).await.unwrap();
        assert!(!orchestrator.record().history.is_empty());

        orchestrator.reset_session();
        assert!(orchestrator.record().history.is_empty());
        assert_eq!(orchestrator.record().status, SessionStatus::Active);
    }
}
