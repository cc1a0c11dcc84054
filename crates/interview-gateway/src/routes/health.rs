// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Readiness and live-counter endpoints. Neither touches a session, so
//! neither requires the `X-Session-ID` extractor.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let registry_ok = state.registry.memory_stats().await.active_sessions < usize::MAX;
    let status = if registry_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "services": {
            "registry": if registry_ok { "ok" } else { "unavailable" },
            "llm": state.llm.name(),
        }
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.registry.memory_stats().await;
    Json(json!({
        "sessions": { "active": sessions.active_sessions },
        "rate_limits": state.governor.all_stats(),
        "system": {
            "uptime_seconds": state.started_at.elapsed().as_secs(),
        }
    }))
}
