// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Session lifecycle routes: create, start, message, end, polling, and
//! the small housekeeping endpoints (history, stats, feedback, reset,
//! time-remaining, ping, cleanup).

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use interview_core::{CoreError, InterviewStyle, Orchestrator, SessionConfig, SessionStatus};
use interview_core::{Event, EventType};

use crate::error::GatewayError;
use crate::extract::SessionId;
use crate::poll::suggested_poll_interval_ms;
use crate::state::AppState;

async fn manager(
    state: &AppState,
    session_id: Uuid,
) -> Result<Arc<Mutex<Orchestrator>>, GatewayError> {
    state
        .registry
        .get_session_manager(session_id)
        .await
        .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()).into())
}

// ── POST /interview/session ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default = "default_job_role")]
    pub job_role: String,
    pub job_description: Option<String>,
    pub resume_content: Option<String>,
    #[serde(default)]
    pub style: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default = "default_target_question_count")]
    pub target_question_count: usize,
    pub company_name: Option<String>,
    pub interview_duration_minutes: Option<u32>,
    #[serde(default = "default_time_based")]
    pub time_based: bool,
}

fn default_job_role() -> String {
    "General Role".to_string()
}
fn default_difficulty() -> String {
    "medium".to_string()
}
fn default_target_question_count() -> usize {
    15
}
fn default_time_based() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub message: String,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, GatewayError> {
    let style = InterviewStyle::from_str(&req.style).unwrap_or_default();
    let config = SessionConfig {
        job_role: req.job_role,
        job_description: req.job_description,
        resume_content: req.resume_content,
        style,
        difficulty: req.difficulty,
        target_question_count: req.target_question_count,
        company_name: req.company_name,
        interview_duration_minutes: req.interview_duration_minutes,
        time_based: req.time_based,
    };

    let session_id = state.registry.create_session(None, config).await;
    tracing::info!(%session_id, owner = "anonymous", "created interview session");

    Ok(Json(CreateSessionResponse {
        session_id,
        message: "session created".to_string(),
    }))
}

// ── POST /interview/start ──────────────────────────────────────────────────

pub async fn start(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> Result<Json<interview_core::AgentResponse>, GatewayError> {
    let manager = manager(&state, session_id).await?;
    let mut orchestrator = manager.lock().await;
    let response = orchestrator.start(state.llm.as_ref()).await?;
    drop(orchestrator);
    state.registry.save_session(session_id).await;

    state.event_bus.publish(Event::new(
        EventType::SessionStart,
        "interview-gateway",
        serde_json::json!({ "session_id": session_id }),
    ));

    Ok(Json(response))
}

// ── POST /interview/message ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

pub async fn message(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
    Json(req): Json<MessageRequest>,
) -> Result<Json<interview_core::AgentResponse>, GatewayError> {
    let manager = manager(&state, session_id).await?;
    let mut orchestrator = manager.lock().await;
    let response = orchestrator.process_message(state.llm.as_ref(), &state.coach, &req.message).await?;
    drop(orchestrator);
    state.registry.save_session(session_id).await;

    state.event_bus.publish(Event::new(
        EventType::UserMessage,
        "interview-gateway",
        serde_json::json!({ "session_id": session_id, "message": req.message }),
    ));
    state.event_bus.publish(Event::new(
        EventType::AssistantResponse,
        "interview-gateway",
        serde_json::json!({ "session_id": session_id, "response_type": response.response_type }),
    ));

    Ok(Json(response))
}

// ── POST /interview/end ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct EndResponse {
    /// Always empty at end time; the summary is retrieved exclusively via
    /// `final-summary-status` polling (§9 Open Question 2, preserved).
    pub results: serde_json::Value,
    pub per_turn_feedback: Vec<interview_core::FeedbackEntry>,
    pub final_summary_status: &'static str,
    pub has_immediate_data: bool,
}

pub async fn end(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> Result<Json<EndResponse>, GatewayError> {
    let manager = manager(&state, session_id).await?;
    let mut orchestrator = manager.lock().await;

    orchestrator
        .end_interview(state.store.clone(), state.llm.clone(), state.search.clone(), state.coach.clone())
        .await;

    let per_turn_feedback = orchestrator.record().per_turn_feedback.clone();
    drop(orchestrator);
    state.registry.save_session(session_id).await;

    state.event_bus.publish(Event::new(
        EventType::SessionEnd,
        "interview-gateway",
        serde_json::json!({ "session_id": session_id }),
    ));

    Ok(Json(EndResponse {
        results: serde_json::json!({}),
        per_turn_feedback,
        final_summary_status: "generating",
        has_immediate_data: true,
    }))
}

// ── GET /interview/final-summary-status ────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    #[serde(default = "default_poll_count")]
    pub poll_count: u32,
}

fn default_poll_count() -> u32 {
    1
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<interview_core::Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub suggested_poll_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_completion_timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn final_summary_status(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollResponse>, GatewayError> {
    let record = state
        .registry
        .final_summary_status(session_id)
        .await
        .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;

    if record.summary_generating {
        return Ok(Json(PollResponse {
            status: "generating",
            results: None,
            error: None,
            suggested_poll_interval_ms: suggested_poll_interval_ms(query.poll_count),
            resource_completion_timestamp: None,
        }));
    }

    match record.final_summary {
        Some(summary) if summary.error.is_some() => Ok(Json(PollResponse {
            status: "error",
            error: summary.error.clone(),
            results: Some(summary),
            suggested_poll_interval_ms: 0,
            resource_completion_timestamp: record.resource_generation_completed_at,
        })),
        Some(summary) => Ok(Json(PollResponse {
            status: "completed",
            results: Some(summary),
            error: None,
            suggested_poll_interval_ms: 0,
            resource_completion_timestamp: record.resource_generation_completed_at,
        })),
        None => Ok(Json(PollResponse {
            status: "generating",
            results: None,
            error: None,
            suggested_poll_interval_ms: suggested_poll_interval_ms(query.poll_count),
            resource_completion_timestamp: None,
        })),
    }
}

// ── GET /interview/history ──────────────────────────────────────────────────

pub async fn history(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let manager = manager(&state, session_id).await?;
    let orchestrator = manager.lock().await;
    Ok(Json(serde_json::json!({ "history": orchestrator.record().history })))
}

// ── GET /interview/stats ─────────────────────────────────────────────────────

pub async fn stats(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let manager = manager(&state, session_id).await?;
    let orchestrator = manager.lock().await;
    Ok(Json(serde_json::json!({ "stats": orchestrator.record().stats })))
}

// ── GET /interview/per-turn-feedback ────────────────────────────────────────

pub async fn per_turn_feedback(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> Result<Json<Vec<interview_core::FeedbackEntry>>, GatewayError> {
    let manager = manager(&state, session_id).await?;
    let orchestrator = manager.lock().await;
    Ok(Json(orchestrator.record().per_turn_feedback.clone()))
}

// ── POST /interview/reset ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: String,
    pub session_id: Uuid,
}

pub async fn reset(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> Result<Json<ResetResponse>, GatewayError> {
    let manager = manager(&state, session_id).await?;
    let mut orchestrator = manager.lock().await;
    orchestrator.reset_session();
    drop(orchestrator);
    state.registry.save_session(session_id).await;

    state.event_bus.publish(Event::new(
        EventType::SessionReset,
        "interview-gateway",
        serde_json::json!({ "session_id": session_id }),
    ));

    Ok(Json(ResetResponse { message: "session reset".to_string(), session_id }))
}

// ── GET /interview/session/time-remaining ───────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TimeRemainingResponse {
    pub time_remaining_minutes: Option<f64>,
    pub session_active: bool,
}

pub async fn time_remaining(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> Result<Json<TimeRemainingResponse>, GatewayError> {
    let time_remaining_minutes = state.registry.get_time_remaining(session_id).await;
    let session_active = match state.registry.get_session_manager(session_id).await {
        Some(manager) => manager.lock().await.record().status == SessionStatus::Active,
        None => false,
    };

    Ok(Json(TimeRemainingResponse { time_remaining_minutes, session_active }))
}

// ── POST /interview/session/ping ────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub success: bool,
    pub new_expiry_minutes: f64,
}

pub async fn ping(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> Result<Json<PingResponse>, GatewayError> {
    let success = state.registry.ping_session(session_id).await;
    Ok(Json(PingResponse { success, new_expiry_minutes: state.registry.idle_timeout_minutes() }))
}

// ── POST /interview/session/cleanup ─────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
}

pub async fn cleanup(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> Result<Json<CleanupResponse>, GatewayError> {
    let success = state.registry.cleanup_session_immediately(session_id).await;
    let message = if success { "session released".to_string() } else { "session was not active".to_string() };
    Ok(Json(CleanupResponse { success, message }))
}
