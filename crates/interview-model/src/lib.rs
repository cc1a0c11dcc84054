// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The single external-LLM collaborator seam: an async trait plus mock and
//! real implementations. Interviewer, Coach, and question-bank generation
//! all call through [`LlmProvider`] rather than a concrete HTTP client.

mod mock;
mod openai;
mod provider;
mod types;

pub use mock::{MockProvider, ScriptedMockProvider};
pub use openai::OpenAiProvider;
pub use provider::{LlmProvider, ResponseStream};
pub use types::{CompletionRequest, Message, ResponseEvent, Role};
