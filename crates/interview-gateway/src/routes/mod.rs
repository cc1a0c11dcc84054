// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

pub mod health;
pub mod session;
pub mod speech;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/interview/session", post(session::create_session))
        .route("/interview/start", post(session::start))
        .route("/interview/message", post(session::message))
        .route("/interview/end", post(session::end))
        .route("/interview/final-summary-status", get(session::final_summary_status))
        .route("/interview/history", get(session::history))
        .route("/interview/stats", get(session::stats))
        .route("/interview/per-turn-feedback", get(session::per_turn_feedback))
        .route("/interview/reset", post(session::reset))
        .route("/interview/session/time-remaining", get(session::time_remaining))
        .route("/interview/session/ping", post(session::ping))
        .route("/interview/session/cleanup", post(session::cleanup))
        .route("/api/speech-to-text", post(speech::submit_batch))
        .route("/api/speech-to-text/status/:task_id", get(speech::batch_status))
        .route("/api/speech-to-text/stream", get(speech::stream_stt))
        .route("/api/text-to-speech", post(speech::synthesize))
        .route("/api/text-to-speech/stream", post(speech::synthesize_stream))
        .route("/api/speech/usage-stats", get(speech::usage_stats))
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
}
