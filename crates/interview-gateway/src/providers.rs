// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Construction of the external-collaborator seams (LLM, search, STT,
//! TTS). These providers are explicitly out of scope for this backend —
//! it owns the session/orchestration pipeline, not the speech or search
//! vendors behind it — so construction is env-var gated: a real provider
//! is wired up if its credentials are present, otherwise a clearly-labeled
//! stand-in takes its place so the rest of the pipeline still runs.

use std::sync::Arc;

use async_trait::async_trait;

use interview_core::{SearchHit, SearchProvider, SttProvider, TtsProvider};
use interview_model::{LlmProvider, MockProvider, OpenAiProvider};

/// Build the LLM provider from `INTERVIEW_LLM_*` environment variables,
/// falling back to the in-process mock (echoes input, useful for demos
/// and integration tests) if no API key is configured.
pub fn build_llm_provider() -> Arc<dyn LlmProvider> {
    match std::env::var("INTERVIEW_LLM_API_KEY") {
        Ok(api_key) => {
            let model = std::env::var("INTERVIEW_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
            let base_url = std::env::var("INTERVIEW_LLM_BASE_URL").ok();
            tracing::info!(model, "using OpenAI-compatible LLM provider");
            Arc::new(OpenAiProvider::new(model, Some(api_key), base_url))
        }
        Err(_) => {
            tracing::warn!("INTERVIEW_LLM_API_KEY not set; falling back to the mock LLM provider");
            Arc::new(MockProvider)
        }
    }
}

/// No-op search provider used when no search backend is configured. Never
/// errors: an empty result set degrades the coach's resource
/// recommendations to the hardcoded fallback list rather than failing the
/// interview.
pub struct NullSearchProvider;

#[async_trait]
impl SearchProvider for NullSearchProvider {
    async fn search(&self, _query: &str, _count: usize) -> anyhow::Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }
}

pub fn build_search_provider() -> Arc<dyn SearchProvider> {
    tracing::warn!("no search provider configured; resource recommendations use the fallback list only");
    Arc::new(NullSearchProvider)
}

/// Speech providers have no mock implementation worth shipping (there is
/// no meaningful "fake transcription"): both stand-ins return a clear
/// configuration error so a caller sees why the call failed rather than a
/// silent garbage result.
pub struct UnavailableStt;

#[async_trait]
impl SttProvider for UnavailableStt {
    async fn transcribe(&self, _audio: &[u8]) -> anyhow::Result<String> {
        anyhow::bail!("speech-to-text is not configured; set INTERVIEW_STT_PROVIDER")
    }
}

pub struct UnavailableTts;

#[async_trait]
impl TtsProvider for UnavailableTts {
    async fn synthesize(&self, _ssml: &str) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("text-to-speech is not configured; set INTERVIEW_TTS_PROVIDER")
    }
}

pub fn build_stt_provider() -> Arc<dyn SttProvider> {
    if std::env::var("INTERVIEW_STT_PROVIDER").is_err() {
        tracing::warn!("no speech-to-text provider configured");
    }
    Arc::new(UnavailableStt)
}

pub fn build_tts_provider() -> Arc<dyn TtsProvider> {
    if std::env::var("INTERVIEW_TTS_PROVIDER").is_err() {
        tracing::warn!("no text-to-speech provider configured");
    }
    Arc::new(UnavailableTts)
}
