// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Maps `interview_core::CoreError` (and any other failure reaching a
//! route handler) onto the status codes from the error handling design:
//! `InvalidInput`/bad requests are 4xx, `SessionNotFound` is 404,
//! `RateLimited` is 429, `ProviderError`/`GenerationError` are 502,
//! anything unanticipated is 500 with a correlation id.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use interview_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("session not found")]
    SessionNotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::Core(CoreError::InvalidInput(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            GatewayError::Core(CoreError::SessionNotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            GatewayError::Core(CoreError::RateLimited(msg)) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            GatewayError::Core(CoreError::ProviderError(msg)) => (StatusCode::BAD_GATEWAY, msg.clone()),
            GatewayError::Core(CoreError::GenerationError(msg)) => (StatusCode::BAD_GATEWAY, msg.clone()),
            GatewayError::Core(CoreError::InternalError(msg)) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            GatewayError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            GatewayError::SessionNotFound => (StatusCode::NOT_FOUND, "session not found".to_string()),
            GatewayError::Internal(err) => {
                let correlation_id = Uuid::new_v4();
                tracing::error!(%correlation_id, error = %err, "unhandled error in request path");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("internal error (correlation id: {correlation_id})"),
                )
            }
        };

        if !matches!(self, GatewayError::Internal(_)) {
            tracing::warn!(status = %status, error = %self, "request failed");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
