// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `X-Session-ID` extractor — every session-scoped route requires it.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::GatewayError;

pub struct SessionId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("X-Session-ID")
            .ok_or_else(|| GatewayError::BadRequest("missing X-Session-ID header".to_string()))?
            .to_str()
            .map_err(|_| GatewayError::BadRequest("X-Session-ID header is not valid UTF-8".to_string()))?;

        let id = raw
            .parse::<Uuid>()
            .map_err(|_| GatewayError::BadRequest("X-Session-ID header is not a valid UUID".to_string()))?;

        Ok(SessionId(id))
    }
}
