// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Speech Task Tracker (C8) — batch and streaming STT, TTS with SSML
//! construction, a small result cache, and upload validation.
//!
//! STT and TTS both go through the Rate Governor before the provider
//! call, and both apply the same back-pressure policy: a task is only
//! ever created once a slot is acquired, so a caller never polls a task
//! id for work that was silently dropped under load. When the governor
//! times out, the caller gets a [`CoreError::RateLimited`] immediately
//! instead of a task id, mirroring the original upload endpoint's
//! synchronous 429 behavior.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use interview_config::UploadConfig;

use crate::error::{CoreError, CoreResult};
use crate::governor::{Provider as GovernorProvider, RateGovernor};
use crate::model::{InterviewStyle, SpeechTaskRecord, SpeechTaskStatus, SpeechTaskType};
use crate::store::StoreGateway;

#[async_trait]
pub trait SttProvider: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> anyhow::Result<String>;
}

#[async_trait]
pub trait TtsProvider: Send + Sync {
    async fn synthesize(&self, ssml: &str) -> anyhow::Result<Vec<u8>>;
}

pub struct SpeechTaskTracker {
    store: Arc<dyn StoreGateway>,
    governor: Arc<RateGovernor>,
    tts_cache: RwLock<HashMap<u64, Arc<Vec<u8>>>>,
    cleanup_handle: StdMutex<Option<JoinHandle<()>>>,
}

impl SpeechTaskTracker {
    pub fn new(store: Arc<dyn StoreGateway>, governor: Arc<RateGovernor>) -> Self {
        Self {
            store,
            governor,
            tts_cache: RwLock::new(HashMap::new()),
            cleanup_handle: StdMutex::new(None),
        }
    }

    /// Submit a complete audio buffer for batch transcription. Acquires a
    /// governor slot synchronously (so the caller learns about
    /// back-pressure immediately) and runs the actual transcription in
    /// the background, updating the task record when it finishes.
    pub async fn submit_batch_stt(
        &self,
        session_id: &str,
        audio: Vec<u8>,
        provider: Arc<dyn SttProvider>,
    ) -> CoreResult<Uuid> {
        // §4.8 back-pressure policy: a provider already known to be
        // saturated rejects immediately rather than making the caller wait
        // out the full acquire timeout before learning the same thing.
        if !self.governor.available(GovernorProvider::SttBatch) {
            return Err(CoreError::RateLimited("speech-to-text capacity exhausted".to_string()));
        }
        let _permit_check = self
            .governor
            .acquire(GovernorProvider::SttBatch)
            .await
            .ok_or_else(|| CoreError::RateLimited("speech-to-text capacity exhausted".to_string()))?;

        let task_id = self.store.create_speech_task(session_id, SpeechTaskType::SttBatch).await;

        let store = self.store.clone();
        let governor = self.governor.clone();
        tokio::spawn(async move {
            // Hold a fresh permit for the duration of the actual transcription;
            // the synchronous check above only proves a slot was free, it does
            // not reserve one across the `tokio::spawn` boundary.
            let _permit = governor.acquire(GovernorProvider::SttBatch).await;
            let result = with_retry(|| provider.transcribe(&audio)).await;
            match result {
                Ok(text) => {
                    let mut result_map = HashMap::new();
                    result_map.insert("text".to_string(), serde_json::json!(text));
                    store
                        .update_speech_task(task_id, SpeechTaskStatus::Completed, None, Some(result_map), None)
                        .await;
                }
                Err(err) => {
                    store
                        .update_speech_task(task_id, SpeechTaskStatus::Error, None, None, Some(err.to_string()))
                        .await;
                }
            }
        });

        Ok(task_id)
    }

    /// Streaming STT delivers partial transcripts as they arrive; each
    /// chunk updates the task's `progress` map in place rather than
    /// waiting for a final result.
    pub async fn submit_stream_stt(&self, session_id: &str) -> CoreResult<Uuid> {
        if !self.governor.available(GovernorProvider::SttStream) {
            return Err(CoreError::RateLimited("streaming speech-to-text capacity exhausted".to_string()));
        }
        Ok(self.store.create_speech_task(session_id, SpeechTaskType::SttStream).await)
    }

    pub async fn push_stream_chunk(&self, task_id: Uuid, partial_transcript: &str, is_final: bool) -> bool {
        let mut progress = HashMap::new();
        progress.insert("partial_transcript".to_string(), serde_json::json!(partial_transcript));
        progress.insert("is_final".to_string(), serde_json::json!(is_final));

        let status = if is_final { SpeechTaskStatus::Completed } else { SpeechTaskStatus::Processing };
        let result = is_final.then(|| {
            let mut m = HashMap::new();
            m.insert("text".to_string(), serde_json::json!(partial_transcript));
            m
        });

        self.store.update_speech_task(task_id, status, Some(progress), result, None).await
    }

    /// Synthesize speech for `text`, returning a cached result if this
    /// exact `(style, text)` pair was already rendered for this process
    /// lifetime. Unlike STT, the audio bytes are needed synchronously by
    /// the caller (the HTTP response body), so they're returned directly
    /// alongside the task id rather than only through `poll_task`; the
    /// task record still exists for usage accounting and traceability.
    pub async fn submit_tts(
        &self,
        session_id: &str,
        text: &str,
        style: InterviewStyle,
        provider: Arc<dyn TtsProvider>,
    ) -> CoreResult<(Uuid, Arc<Vec<u8>>)> {
        let ssml = build_ssml(text, style);
        let cache_key = hash_ssml(&ssml);

        let task_id = self.store.create_speech_task(session_id, SpeechTaskType::Tts).await;

        if let Some(cached) = self.tts_cache.read().await.get(&cache_key).cloned() {
            let mut result_map = HashMap::new();
            result_map.insert("audio_bytes_len".to_string(), serde_json::json!(cached.len()));
            result_map.insert("cached".to_string(), serde_json::json!(true));
            self.store
                .update_speech_task(task_id, SpeechTaskStatus::Completed, None, Some(result_map), None)
                .await;
            return Ok((task_id, cached));
        }

        if !self.governor.available(GovernorProvider::Tts) {
            return Err(CoreError::RateLimited("text-to-speech capacity exhausted".to_string()));
        }
        let _permit = self
            .governor
            .acquire(GovernorProvider::Tts)
            .await
            .ok_or_else(|| CoreError::RateLimited("text-to-speech capacity exhausted".to_string()))?;

        match with_retry(|| provider.synthesize(&ssml)).await {
            Ok(bytes) => {
                let bytes = Arc::new(bytes);
                self.tts_cache.write().await.insert(cache_key, bytes.clone());
                let mut result_map = HashMap::new();
                result_map.insert("audio_bytes_len".to_string(), serde_json::json!(bytes.len()));
                result_map.insert("cached".to_string(), serde_json::json!(false));
                self.store
                    .update_speech_task(task_id, SpeechTaskStatus::Completed, None, Some(result_map), None)
                    .await;
                Ok((task_id, bytes))
            }
            Err(err) => {
                self.store
                    .update_speech_task(task_id, SpeechTaskStatus::Error, None, None, Some(err.to_string()))
                    .await;
                Err(CoreError::ProviderError(err.to_string()))
            }
        }
    }

    pub async fn poll_task(&self, task_id: Uuid) -> Option<SpeechTaskRecord> {
        self.store.get_speech_task(task_id).await
    }

    /// Remove speech task records last updated more than `retention_hours`
    /// ago. Returns the count removed.
    pub async fn cleanup_stale_tasks(&self, retention_hours: i64) -> usize {
        self.store.cleanup_speech_tasks(retention_hours).await
    }

    /// Spawn a background sweeper that calls [`cleanup_stale_tasks`] on
    /// `interval`, mirroring the session registry's idle sweeper. Replaces
    /// any previously running sweeper.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration, retention_hours: i64) {
        let tracker = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = tracker.cleanup_stale_tasks(retention_hours).await;
                if removed > 0 {
                    tracing::debug!(removed, "swept stale speech task records");
                }
            }
        });

        if let Some(previous) = self.cleanup_handle.lock().expect("cleanup handle lock poisoned").replace(handle) {
            previous.abort();
        }
    }

    pub async fn stop_cleanup_task(&self) {
        let handle = self.cleanup_handle.lock().expect("cleanup handle lock poisoned").take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Wrap `text` in an SSML `<speak>` document. Pacing varies by interview
/// style: an aggressive interviewer reads faster, a casual one slower,
/// matching how the style already shapes word choice in the templates.
pub fn build_ssml(text: &str, style: InterviewStyle) -> String {
    let rate = match style {
        InterviewStyle::Aggressive => "fast",
        InterviewStyle::Casual => "slow",
        InterviewStyle::Formal | InterviewStyle::Technical => "medium",
    };
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<speak><break time=\"250ms\"/><prosody rate=\"{rate}\">{escaped}</prosody></speak>")
}

/// Run `attempt` up to 3 times total with exponential back-off plus jitter
/// between tries, per §4.8/§7's "retried with exponential back-off + jitter
/// up to three times for throttling/5xx" provider-error policy.
async fn with_retry<F, Fut, T>(mut attempt: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    const MAX_ATTEMPTS: u32 = 3;
    let mut base_delay_ms: u64 = 200;
    let mut last_err = None;

    for attempt_no in 0..MAX_ATTEMPTS {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_err = Some(err);
                if attempt_no + 1 < MAX_ATTEMPTS {
                    let jitter_ms = rand::thread_rng().gen_range(0..100);
                    tokio::time::sleep(Duration::from_millis(base_delay_ms + jitter_ms)).await;
                    base_delay_ms *= 2;
                }
            }
        }
    }
    Err(last_err.expect("loop always runs at least once"))
}

fn hash_ssml(ssml: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    ssml.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("file exceeds the maximum allowed size of {max} bytes")]
    TooLarge { max: u64 },
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
    #[error("extracted text is too short to be a usable resume or job description")]
    TextTooShort,
    #[error("extracted text exceeds the maximum allowed length of {max} bytes")]
    TextTooLong { max: u64 },
    #[error("filename exceeds {max} characters")]
    FilenameTooLong { max: usize },
    #[error("filename contains a path traversal sequence")]
    PathTraversal,
}

/// Validate an uploaded resume/job-description file's metadata and
/// extracted text length before it's accepted into a session config.
pub fn validate_upload(
    filename: &str,
    content_type: &str,
    size_bytes: u64,
    extracted_text_len: usize,
    config: &UploadConfig,
) -> Result<(), UploadError> {
    if size_bytes > config.max_file_size_bytes {
        return Err(UploadError::TooLarge { max: config.max_file_size_bytes });
    }
    if !interview_config::ALLOWED_UPLOAD_CONTENT_TYPES.contains(&content_type) {
        return Err(UploadError::UnsupportedContentType(content_type.to_string()));
    }
    if filename.len() > config.max_filename_length {
        return Err(UploadError::FilenameTooLong { max: config.max_filename_length });
    }
    if filename.contains("..") || filename.starts_with('/') {
        return Err(UploadError::PathTraversal);
    }
    if extracted_text_len < config.min_text_length {
        return Err(UploadError::TextTooShort);
    }
    if extracted_text_len as u64 > config.max_text_content_length_bytes {
        return Err(UploadError::TextTooLong { max: config.max_text_content_length_bytes });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use interview_config::Config;

    struct EchoStt;
    #[async_trait]
    impl SttProvider for EchoStt {
        async fn transcribe(&self, audio: &[u8]) -> anyhow::Result<String> {
            Ok(format!("heard {} bytes", audio.len()))
        }
    }

    struct FixedTts;
    #[async_trait]
    impl TtsProvider for FixedTts {
        async fn synthesize(&self, _ssml: &str) -> anyhow::Result<Vec<u8>> {
            Ok(vec![1, 2, 3, 4])
        }
    }

    fn tracker() -> SpeechTaskTracker {
        let store = InMemoryStore::new();
        let governor = Arc::new(RateGovernor::new(&Config::default().rate_limits));
        SpeechTaskTracker::new(store, governor)
    }

    struct FlakyStt {
        failures_remaining: std::sync::atomic::AtomicU32,
    }
    #[async_trait]
    impl SttProvider for FlakyStt {
        async fn transcribe(&self, audio: &[u8]) -> anyhow::Result<String> {
            if self.failures_remaining.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) > 0 {
                anyhow::bail!("503 service unavailable");
            }
            Ok(format!("heard {} bytes", audio.len()))
        }
    }

    #[tokio::test]
    async fn batch_stt_retries_transient_provider_failures() {
        let tracker = tracker();
        let flaky = Arc::new(FlakyStt { failures_remaining: std::sync::atomic::AtomicU32::new(2) });
        let task_id = tracker.submit_batch_stt("s1", vec![0u8; 8], flaky).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        let task = tracker.poll_task(task_id).await.unwrap();
        assert_eq!(task.status, SpeechTaskStatus::Completed);
    }

    #[tokio::test]
    async fn batch_stt_gives_up_after_three_attempts() {
        let tracker = tracker();
        let flaky = Arc::new(FlakyStt { failures_remaining: std::sync::atomic::AtomicU32::new(10) });
        let task_id = tracker.submit_batch_stt("s1", vec![0u8; 8], flaky).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        let task = tracker.poll_task(task_id).await.unwrap();
        assert_eq!(task.status, SpeechTaskStatus::Error);
    }

    #[tokio::test]
    async fn batch_stt_completes_and_is_pollable() {
        let tracker = tracker();
        let task_id = tracker.submit_batch_stt("s1", vec![0u8; 16], Arc::new(EchoStt)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let task = tracker.poll_task(task_id).await.unwrap();
        assert_eq!(task.status, SpeechTaskStatus::Completed);
    }

    #[tokio::test]
    async fn tts_caches_identical_requests() {
        let tracker = tracker();
        let (t1, bytes1) =
            tracker.submit_tts("s1", "hello", InterviewStyle::Formal, Arc::new(FixedTts)).await.unwrap();
        assert_eq!(*bytes1, vec![1, 2, 3, 4]);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let first = tracker.poll_task(t1).await.unwrap();
        assert_eq!(first.result.unwrap()["cached"], serde_json::json!(false));

        let (t2, bytes2) =
            tracker.submit_tts("s1", "hello", InterviewStyle::Formal, Arc::new(FixedTts)).await.unwrap();
        assert_eq!(*bytes2, vec![1, 2, 3, 4]);
        let second = tracker.poll_task(t2).await.unwrap();
        assert_eq!(second.result.unwrap()["cached"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn stream_chunk_marks_completed_only_on_final_chunk() {
        let tracker = tracker();
        let task_id = tracker.submit_stream_stt("s1").await.unwrap();
        tracker.push_stream_chunk(task_id, "partial", false).await;
        assert_eq!(tracker.poll_task(task_id).await.unwrap().status, SpeechTaskStatus::Processing);
        tracker.push_stream_chunk(task_id, "final text", true).await;
        assert_eq!(tracker.poll_task(task_id).await.unwrap().status, SpeechTaskStatus::Completed);
    }

    #[tokio::test]
    async fn cleanup_task_sweeps_stale_speech_task_records() {
        let tracker = tracker();
        let task_id = tracker.submit_batch_stt("s1", vec![0u8; 4], Arc::new(EchoStt)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(tracker.poll_task(task_id).await.is_some());

        // A negative retention treats every record, however fresh, as stale.
        let removed = tracker.cleanup_stale_tasks(-1).await;
        assert_eq!(removed, 1);
        assert!(tracker.poll_task(task_id).await.is_none());
    }

    #[test]
    fn ssml_escapes_reserved_characters() {
        let ssml = build_ssml("A & B < C", InterviewStyle::Formal);
        assert!(ssml.contains("A &amp; B &lt; C"));
    }

    #[test]
    fn validate_upload_rejects_oversized_file() {
        let config = UploadConfig { max_file_size_bytes: 100, ..Config::default().upload };
        let result = validate_upload("resume.pdf", "application/pdf", 200, 50, &config);
        assert!(matches!(result, Err(UploadError::TooLarge { max: 100 })));
    }

    #[test]
    fn validate_upload_rejects_unsupported_content_type() {
        let config = Config::default().upload;
        let result = validate_upload("resume.exe", "application/x-msdownload", 10, 50, &config);
        assert!(matches!(result, Err(UploadError::UnsupportedContentType(_))));
    }

    #[test]
    fn validate_upload_rejects_path_traversal_filename() {
        let config = Config::default().upload;
        let result = validate_upload("../../etc/passwd.pdf", "application/pdf", 10, 50, &config);
        assert!(matches!(result, Err(UploadError::PathTraversal)));
    }

    #[test]
    fn validate_upload_accepts_well_formed_pdf() {
        let config = Config::default().upload;
        let result = validate_upload("resume.pdf", "application/pdf", 1024, 500, &config);
        assert!(result.is_ok());
    }

    #[test]
    fn validate_upload_rejects_oversized_extracted_text() {
        let config = UploadConfig { max_text_content_length_bytes: 100, ..Config::default().upload };
        let result = validate_upload("resume.pdf", "application/pdf", 1024, 500, &config);
        assert!(matches!(result, Err(UploadError::TextTooLong { max: 100 })));
    }
}
