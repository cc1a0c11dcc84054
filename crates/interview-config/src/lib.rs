// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Runtime configuration, read directly from the environment.
//!
//! This crate has no file discovery: every knob has a documented default
//! and an optional environment-variable override, read once at startup
//! via [`Config::from_env`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod error;

pub use error::ConfigError;

/// Top-level runtime configuration for the interview backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub http: HttpConfig,
    pub session: SessionConfig,
    pub rate_limits: RateLimitConfig,
    pub upload: UploadConfig,
    pub speech: SpeechConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            session: SessionConfig::default(),
            rate_limits: RateLimitConfig::default(),
            upload: UploadConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl Config {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset. Fails only if a set variable cannot be
    /// parsed as the expected type.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Config::default();

        if let Some(v) = env_var("INTERVIEW_HTTP_BIND")? {
            cfg.http.bind = v;
        }
        if let Some(v) = env_u64("INTERVIEW_SESSION_IDLE_TIMEOUT_SECS")? {
            cfg.session.idle_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("INTERVIEW_SESSION_MAX_DURATION_SECS")? {
            cfg.session.max_duration = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("INTERVIEW_SESSION_IDLE_SWEEP_INTERVAL_SECS")? {
            cfg.session.idle_sweep_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_usize("INTERVIEW_SESSION_MIN_QUESTIONS")? {
            cfg.session.minimum_question_count = v;
        }
        if let Some(v) = env_usize("INTERVIEW_MAX_CONCURRENT_SESSIONS")? {
            cfg.session.max_concurrent_sessions = v;
        }
        if let Some(v) = env_usize("INTERVIEW_RATE_LIMIT_ASSEMBLYAI")? {
            cfg.rate_limits.assemblyai = v;
        }
        if let Some(v) = env_usize("INTERVIEW_RATE_LIMIT_POLLY")? {
            cfg.rate_limits.polly = v;
        }
        if let Some(v) = env_usize("INTERVIEW_RATE_LIMIT_DEEPGRAM")? {
            cfg.rate_limits.deepgram = v;
        }
        if let Some(v) = env_usize("INTERVIEW_RATE_LIMIT_SEARCH")? {
            cfg.rate_limits.search = v;
        }
        if let Some(v) = env_u64("INTERVIEW_RATE_LIMIT_ACQUIRE_TIMEOUT_SECS")? {
            cfg.rate_limits.acquire_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("INTERVIEW_UPLOAD_MAX_FILE_SIZE_BYTES")? {
            cfg.upload.max_file_size_bytes = v;
        }
        if let Some(v) = env_u64("INTERVIEW_SPEECH_TASK_RETENTION_HOURS")? {
            cfg.speech.task_retention_hours = v as i64;
        }
        if let Some(v) = env_u64("INTERVIEW_SPEECH_TASK_SWEEP_INTERVAL_SECS")? {
            cfg.speech.task_sweep_interval = Duration::from_secs(v);
        }

        Ok(cfg)
    }
}

/// HTTP/WebSocket server binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Session lifecycle knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time before the registry sweeper reclaims a session.
    #[serde(with = "duration_secs", default = "default_idle_timeout")]
    pub idle_timeout: Duration,
    /// How often the registry's background sweeper checks for idle sessions.
    #[serde(with = "duration_secs", default = "default_idle_sweep_interval")]
    pub idle_sweep_interval: Duration,
    /// Hard wall-clock cap on a single interview.
    #[serde(with = "duration_secs", default = "default_max_duration")]
    pub max_duration: Duration,
    /// Floor on the question count an interview must reach before it is
    /// eligible to end early.
    #[serde(default = "default_min_questions")]
    pub minimum_question_count: usize,
    /// Upper bound on simultaneously active sessions.
    #[serde(default = "default_max_sessions")]
    pub max_concurrent_sessions: usize,
    /// Estimated minutes per question, used for pacing suggestions.
    #[serde(default = "default_minutes_per_question")]
    pub estimated_minutes_per_question: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: default_idle_timeout(),
            idle_sweep_interval: default_idle_sweep_interval(),
            max_duration: default_max_duration(),
            minimum_question_count: default_min_questions(),
            max_concurrent_sessions: default_max_sessions(),
            estimated_minutes_per_question: default_minutes_per_question(),
        }
    }
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(15 * 60)
}
fn default_idle_sweep_interval() -> Duration {
    Duration::from_secs(60)
}
fn default_max_duration() -> Duration {
    Duration::from_secs(60 * 60)
}
fn default_min_questions() -> usize {
    3
}
fn default_max_sessions() -> usize {
    200
}
fn default_minutes_per_question() -> u32 {
    3
}

/// Per-provider concurrency slot counts for the rate governor (C1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_assemblyai")]
    pub assemblyai: usize,
    #[serde(default = "default_polly")]
    pub polly: usize,
    #[serde(default = "default_deepgram")]
    pub deepgram: usize,
    #[serde(default = "default_search")]
    pub search: usize,
    #[serde(with = "duration_secs", default = "default_acquire_timeout")]
    pub acquire_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            assemblyai: default_assemblyai(),
            polly: default_polly(),
            deepgram: default_deepgram(),
            search: default_search(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

fn default_assemblyai() -> usize {
    5
}
fn default_polly() -> usize {
    26
}
fn default_deepgram() -> usize {
    10
}
fn default_search() -> usize {
    3
}
fn default_acquire_timeout() -> Duration {
    Duration::from_secs(5)
}

/// File-upload validation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    #[serde(default = "default_max_text_content_length")]
    pub max_text_content_length_bytes: u64,
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,
    #[serde(default = "default_max_filename_length")]
    pub max_filename_length: usize,
    #[serde(default = "default_upload_rate_limit")]
    pub uploads_per_minute_per_ip: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            max_text_content_length_bytes: default_max_text_content_length(),
            min_text_length: default_min_text_length(),
            max_filename_length: default_max_filename_length(),
            uploads_per_minute_per_ip: default_upload_rate_limit(),
        }
    }
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}
fn default_max_text_content_length() -> u64 {
    1000 * 1024
}
fn default_min_text_length() -> usize {
    10
}
fn default_max_filename_length() -> usize {
    255
}
fn default_upload_rate_limit() -> usize {
    10
}

/// Speech task record retention and sweep cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Completed/errored speech task records older than this are eligible
    /// for removal by the periodic sweeper.
    #[serde(default = "default_speech_task_retention_hours")]
    pub task_retention_hours: i64,
    /// How often the speech task sweeper runs.
    #[serde(with = "duration_secs", default = "default_speech_task_sweep_interval")]
    pub task_sweep_interval: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            task_retention_hours: default_speech_task_retention_hours(),
            task_sweep_interval: default_speech_task_sweep_interval(),
        }
    }
}

fn default_speech_task_retention_hours() -> i64 {
    24
}
fn default_speech_task_sweep_interval() -> Duration {
    Duration::from_secs(30 * 60)
}

/// Allowed upload content types, mirroring `ALLOWED_CONTENT_TYPES`.
pub const ALLOWED_UPLOAD_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

fn env_var(name: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(v) => Ok(Some(v)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            source: e.to_string(),
        }),
    }
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
    match env_var(name)? {
        None => Ok(None),
        Some(v) => v
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnv {
                name: name.to_string(),
                source: e.to_string(),
            }),
    }
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
    match env_var(name)? {
        None => Ok(None),
        Some(v) => v
            .parse::<usize>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnv {
                name: name.to_string(),
                source: e.to_string(),
            }),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_rate_limiter_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.rate_limits.assemblyai, 5);
        assert_eq!(cfg.rate_limits.polly, 26);
        assert_eq!(cfg.rate_limits.deepgram, 10);
        assert_eq!(cfg.rate_limits.search, 3);
        assert_eq!(cfg.rate_limits.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn defaults_match_file_processing_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.upload.max_file_size_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.upload.max_text_content_length_bytes, 1000 * 1024);
        assert_eq!(cfg.upload.min_text_length, 10);
        assert_eq!(cfg.upload.max_filename_length, 255);
        assert_eq!(cfg.upload.uploads_per_minute_per_ip, 10);
    }

    #[test]
    fn minimum_question_count_matches_constants_py() {
        assert_eq!(Config::default().session.minimum_question_count, 3);
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = Config::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rate_limits.polly, cfg.rate_limits.polly);
    }

    #[test]
    fn speech_task_retention_defaults_to_one_day() {
        let cfg = Config::default();
        assert_eq!(cfg.speech.task_retention_hours, 24);
        assert_eq!(cfg.speech.task_sweep_interval, Duration::from_secs(30 * 60));
    }

    #[test]
    fn unset_env_vars_fall_back_to_defaults() {
        std::env::remove_var("INTERVIEW_HTTP_BIND");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.http.bind, "127.0.0.1:8080");
    }
}
