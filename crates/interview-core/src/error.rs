// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Error kinds produced by the core orchestration layer.
///
/// The gateway crate maps each variant to an HTTP status code; see its
/// `GatewayError` `IntoResponse` impl.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("generation error: {0}")]
    GenerationError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
