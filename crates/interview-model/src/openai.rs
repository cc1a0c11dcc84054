// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! A single OpenAI-compatible chat-completions driver.
//!
//! The upstream `sven-model` crate ships ~30 provider dispatch branches and a
//! shared SSE-streaming base (`openai_compat.rs`) to support them. The
//! interview backend has exactly one external LLM collaborator and never
//! needs live token-by-token streaming to the browser, so this is a plain
//! request/response POST against `/chat/completions` wrapped in a
//! single-script [`crate::ResponseStream`].

use async_trait::async_trait;
use serde_json::json;

use crate::{provider::ResponseStream, CompletionRequest, Message, ResponseEvent, Role};

pub struct OpenAiProvider {
    model: String,
    api_key: Option<String>,
    chat_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(model: String, api_key: Option<String>, base_url: Option<String>) -> Self {
        let base = base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let base = base.trim_end_matches('/');
        Self {
            model,
            api_key,
            chat_url: format!("{base}/chat/completions"),
            client: reqwest::Client::new(),
        }
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl crate::LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let messages: Vec<serde_json::Value> = req
            .messages
            .iter()
            .map(|m: &Message| json!({ "role": role_str(m.role), "content": m.content }))
            .collect();

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": req.temperature.unwrap_or(0.7),
            "max_tokens": req.max_tokens.unwrap_or(1024),
        });

        let mut builder = self.client.post(&self.chat_url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await?.error_for_status()?;
        let parsed: serde_json::Value = resp.json().await?;

        let text = parsed["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let input_tokens = parsed["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32;
        let output_tokens = parsed["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32;

        let events: Vec<anyhow::Result<ResponseEvent>> = vec![
            Ok(ResponseEvent::TextDelta(text)),
            Ok(ResponseEvent::Usage { input_tokens, output_tokens }),
            Ok(ResponseEvent::Done),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}
