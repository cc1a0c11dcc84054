// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in an LLM completion request.
///
/// This is the wire-format seam, distinct from the richer conversation
/// `Message` kept by the interview session (which also carries a response
/// type and agent tag). Only plain text is modeled — the interview backend
/// never sends or receives images or tool calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: text.into() }
    }

    /// Approximate token count (4 chars per token heuristic).
    pub fn approx_tokens(&self) -> usize {
        (self.content.len() / 4).max(1)
    }
}

/// Request sent to an [`crate::LlmProvider`].
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Streaming event emitted while a completion is generated.
///
/// Trimmed down from the richer multi-provider event enum: the interview
/// backend never streams tool calls or thinking deltas, only plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    TextDelta(String),
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    Done,
}
