// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Process-wide state assembled once at startup and handed to every route
//! handler through `axum::extract::State`. Mirrors the "service singletons
//! constructed during startup, shut down on termination" design note: every
//! field here is an `Arc` over a type that owns its own internal
//! synchronization.

use std::sync::Arc;
use std::time::Instant;

use interview_core::{Coach, EventBus, RateGovernor, SearchProvider, SessionRegistry, SpeechTaskTracker, StoreGateway};
use interview_model::LlmProvider;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn StoreGateway>,
    pub event_bus: Arc<EventBus>,
    pub governor: Arc<RateGovernor>,
    pub speech: Arc<SpeechTaskTracker>,
    pub coach: Arc<Coach>,
    pub llm: Arc<dyn LlmProvider>,
    pub search: Arc<dyn SearchProvider>,
    pub stt: Arc<dyn interview_core::SttProvider>,
    pub tts: Arc<dyn interview_core::TtsProvider>,
    pub config: Arc<interview_config::Config>,
    pub started_at: Instant,
}
