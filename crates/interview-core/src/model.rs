// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Data model: session configuration, the durable session record, and
//! the value types threaded through the interviewer/coach/orchestrator.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Interview style, keys the question-template table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewStyle {
    Formal,
    Casual,
    Aggressive,
    Technical,
}

impl Default for InterviewStyle {
    fn default() -> Self {
        InterviewStyle::Formal
    }
}

impl std::str::FromStr for InterviewStyle {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "formal" => Ok(InterviewStyle::Formal),
            "casual" => Ok(InterviewStyle::Casual),
            "aggressive" => Ok(InterviewStyle::Aggressive),
            "technical" => Ok(InterviewStyle::Technical),
            _ => Err(()),
        }
    }
}

/// Immutable per-session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub job_role: String,
    pub job_description: Option<String>,
    pub resume_content: Option<String>,
    pub style: InterviewStyle,
    pub difficulty: String,
    pub target_question_count: usize,
    pub company_name: Option<String>,
    pub interview_duration_minutes: Option<u32>,
    pub time_based: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            job_role: "General Role".to_string(),
            job_description: None,
            resume_content: None,
            style: InterviewStyle::Formal,
            difficulty: "medium".to_string(),
            target_question_count: 15,
            company_name: None,
            interview_duration_minutes: Some(10),
            time_based: true,
        }
    }
}

/// Conversation roles, distinct from `interview_model::Role` — this type
/// also carries `System` only for provenance, the interview backend never
/// sends system-role turns back out over the HTTP contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentTag {
    Interviewer,
    Coach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Introduction,
    Question,
    Closing,
    Status,
    Error,
}

/// A single turn in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            agent: None,
            response_type: None,
            metadata: None,
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        agent: AgentTag,
        response_type: ResponseType,
    ) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            agent: Some(agent),
            response_type: Some(response_type),
            metadata: None,
        }
    }
}

/// A single per-turn coaching record, question/answer
/// truncated to `FEEDBACK_LOG_TRUNCATE_CHARS` before being stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub question: String,
    pub answer: String,
    pub feedback: String,
}

/// Learning-resource recommendation attached to a final `Summary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    pub url: String,
    pub description: String,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Course,
    Tutorial,
    Documentation,
    Article,
    Video,
    Interactive,
    Community,
    Book,
}

impl std::str::FromStr for ResourceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "course" => Ok(ResourceType::Course),
            "tutorial" => Ok(ResourceType::Tutorial),
            "documentation" => Ok(ResourceType::Documentation),
            "article" => Ok(ResourceType::Article),
            "video" => Ok(ResourceType::Video),
            "interactive" => Ok(ResourceType::Interactive),
            "community" => Ok(ResourceType::Community),
            "book" => Ok(ResourceType::Book),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceType::Course => "course",
            ResourceType::Tutorial => "tutorial",
            ResourceType::Documentation => "documentation",
            ResourceType::Article => "article",
            ResourceType::Video => "video",
            ResourceType::Interactive => "interactive",
            ResourceType::Community => "community",
            ResourceType::Book => "book",
        };
        f.write_str(s)
    }
}

/// Post-interview coaching artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub patterns_tendencies: String,
    pub strengths: String,
    pub weaknesses: String,
    pub improvement_focus_areas: String,
    #[serde(default)]
    pub recommended_resources: Vec<Resource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Interview-phase state machine value, one-way forward except a
/// full `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewPhase {
    Initializing,
    Introducing,
    Questioning,
    Completed,
}

/// State owned by the Interviewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewerState {
    pub phase: InterviewPhase,
    pub initial_questions: Vec<String>,
    pub asked_question_count: usize,
    pub current_question: Option<String>,
    pub areas_covered: Vec<String>,
}

impl Default for InterviewerState {
    fn default() -> Self {
        Self {
            phase: InterviewPhase::Initializing,
            initial_questions: Vec::new(),
            asked_question_count: 0,
            current_question: None,
            areas_covered: Vec::new(),
        }
    }
}

impl InterviewerState {
    pub fn reset(&mut self) {
        *self = InterviewerState::default();
    }

    pub fn ask_question(&mut self, question: impl Into<String>) {
        self.current_question = Some(question.into());
        self.asked_question_count += 1;
    }

    pub fn add_covered_topics(&mut self, topics: &[String]) {
        for topic in topics {
            if !self.areas_covered.contains(topic) {
                self.areas_covered.push(topic.clone());
            }
        }
    }

    pub fn can_end_interview(&self, min_questions: usize) -> bool {
        self.asked_question_count >= min_questions
    }

    pub fn covered_topics_str(&self) -> String {
        if self.areas_covered.is_empty() {
            "None".to_string()
        } else {
            self.areas_covered.join(", ")
        }
    }

    /// Distinct topics accumulated, used by callers that want a `HashSet`
    /// view (e.g. deduplication against a freshly-parsed topic list).
    pub fn covered_topics_set(&self) -> HashSet<String> {
        self.areas_covered.iter().cloned().collect()
    }
}

/// Time bucket used by the Time Manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePhase {
    Opening,
    Exploration,
    Deepening,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePressure {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeContext {
    pub total_duration_minutes: u32,
    pub elapsed_minutes: f64,
    pub remaining_minutes: f64,
    pub progress_percentage: f64,
    pub current_phase: TimePhase,
    pub phase_progress: f64,
    pub time_pressure: TimePressure,
    pub suggested_actions: Vec<String>,
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub api_call_count: u64,
    pub turn_count: u64,
}

/// Final summary generation status, exposed by the polling endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalSummaryStatus {
    Generating,
    Completed,
    Error,
}

/// The durable unit persisted through the Store Gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub owner_user_id: Option<Uuid>,
    pub config: SessionConfig,
    pub history: Vec<Message>,
    pub per_turn_feedback: Vec<FeedbackEntry>,
    pub final_summary: Option<Summary>,
    pub stats: SessionStats,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub summary_generating: bool,
    pub needs_save: bool,
    pub interviewer_state: InterviewerState,
    pub resource_generation_completed_at: Option<DateTime<Utc>>,
    /// The question bank built once at session start (§4.4). Persisted
    /// alongside `interviewer_state` so a rehydrated session (after idle
    /// eviction or a process restart) can keep drawing fallback questions
    /// from the same bank instead of resuming with an empty one.
    #[serde(default)]
    pub question_bank: Vec<String>,
}

impl SessionRecord {
    pub fn new(session_id: Uuid, owner_user_id: Option<Uuid>, config: SessionConfig) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            owner_user_id,
            config,
            history: Vec::new(),
            per_turn_feedback: Vec::new(),
            final_summary: None,
            stats: SessionStats::default(),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
            summary_generating: false,
            needs_save: false,
            interviewer_state: InterviewerState::default(),
            resource_generation_completed_at: None,
            question_bank: Vec::new(),
        }
    }
}

/// Task kinds tracked by the Speech Task Tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechTaskType {
    SttBatch,
    SttStream,
    Tts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechTaskStatus {
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechTaskRecord {
    pub task_id: Uuid,
    pub session_id: String,
    pub task_type: SpeechTaskType,
    pub status: SpeechTaskStatus,
    #[serde(default)]
    pub progress: HashMap<String, serde_json::Value>,
    pub result: Option<HashMap<String, serde_json::Value>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SpeechTaskRecord {
    pub fn new(task_id: Uuid, session_id: impl Into<String>, task_type: SpeechTaskType) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            session_id: session_id.into(),
            task_type,
            status: SpeechTaskStatus::Processing,
            progress: HashMap::new(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The Interviewer's response to a single `process` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub role: MessageRole,
    pub content: String,
    pub agent: AgentTag,
    pub response_type: ResponseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    pub timestamp: DateTime<Utc>,
}

impl AgentResponse {
    pub fn new(content: impl Into<String>, agent: AgentTag, response_type: ResponseType) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            agent,
            response_type,
            metadata: None,
            timestamp: Utc::now(),
        }
    }
}

/// The Interviewer's next-action decision, parsed from the LLM's JSON
/// response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    AskFollowUp,
    AskNewQuestion,
    EndInterview,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextActionDecision {
    pub action_type: Option<String>,
    pub next_question_text: Option<String>,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub newly_covered_topics: Vec<String>,
}

impl Default for NextActionDecision {
    fn default() -> Self {
        Self {
            action_type: Some("ask_new_question".to_string()),
            next_question_text: Some(crate::constants::DEFAULT_FALLBACK_QUESTION.to_string()),
            justification: "processing error".to_string(),
            newly_covered_topics: Vec::new(),
        }
    }
}
