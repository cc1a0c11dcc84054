// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Multi-tenant interview simulation core.
//!
//! This crate owns everything that doesn't talk HTTP directly: the
//! per-session state machine that asks questions (Interviewer), the
//! coach that grades each answer and writes the closing report (Coach),
//! the session map and its idle sweeper (Session Registry), rate limiting
//! against external STT/TTS/search APIs (Rate Governor), the in-memory
//! persistence layer (Store Gateway), the publish/subscribe event feed
//! (Event Bus), and interview pacing against a wall-clock budget (Time
//! Manager). `interview-gateway` is the only crate that depends on this
//! one and exposes it over HTTP/WebSocket.

pub mod coach;
pub mod constants;
pub mod error;
pub mod event_bus;
pub mod governor;
pub mod interviewer;
pub mod json_util;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod search;
pub mod speech;
pub mod store;
pub mod templates;
pub mod time_manager;

pub use coach::Coach;
pub use error::{CoreError, CoreResult};
pub use event_bus::{Event, EventBus, EventType};
pub use governor::{GovernorGuard, Provider as GovernorProvider, ProviderStats, RateGovernor};
pub use interviewer::Interviewer;
pub use orchestrator::Orchestrator;
pub use registry::{RegistryStats, SessionRegistry};
pub use search::{SearchHit, SearchProvider};
pub use speech::{SpeechTaskTracker, SttProvider, TtsProvider, UploadError};
pub use store::{InMemoryStore, StoreGateway};
pub use time_manager::{Milestone, TimeManager};

pub use model::{
    ActionType, AgentResponse, AgentTag, FeedbackEntry, FinalSummaryStatus, InterviewPhase,
    InterviewStyle, InterviewerState, Message, MessageRole, NextActionDecision, Resource,
    ResourceType, ResponseType, SessionConfig, SessionRecord, SessionStats, SessionStatus,
    SpeechTaskRecord, SpeechTaskStatus, SpeechTaskType, Summary, TimeContext, TimePhase,
    TimePressure,
};
