// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

use crate::{CompletionRequest, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name for logging/status.
    fn name(&self) -> &str;

    /// Send a completion request and return a streaming response.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;

    /// Convenience wrapper that drains the stream and concatenates all text
    /// deltas. Most call sites in the interview core do not need to observe
    /// partial tokens, only the final text.
    async fn complete_text(&self, req: CompletionRequest) -> anyhow::Result<String> {
        let mut stream = self.complete(req).await?;
        let mut out = String::new();
        while let Some(event) = stream.next().await {
            if let ResponseEvent::TextDelta(delta) = event? {
                out.push_str(&delta);
            }
        }
        Ok(out)
    }
}
