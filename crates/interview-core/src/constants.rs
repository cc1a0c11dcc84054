// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Fixed strings and thresholds carried verbatim from the original
//! implementation's constants module, as data rather than literals
//! scattered through the logic that uses them.

pub const DEFAULT_JOB_ROLE: &str = "the position";
pub const DEFAULT_COMPANY_NAME: &str = "our company";
pub const DEFAULT_VALUE_NOT_PROVIDED: &str = "Not provided";

pub const DEFAULT_OPENING_QUESTION: &str =
    "To start, could you please tell me a bit about yourself and your background?";
pub const DEFAULT_FALLBACK_QUESTION: &str =
    "Can you tell me about your professional background and experience?";
pub const MINIMUM_QUESTION_COUNT: usize = 3;
pub const ESTIMATED_TIME_PER_QUESTION_MINUTES: u32 = 3;

pub const ERROR_PROCESSING_REQUEST: &str =
    "Sorry, I encountered an error processing your request. Please try again.";
pub const ERROR_INTERVIEW_SETUP: &str =
    "Sorry, I encountered an error setting up the interview questions.";
pub const ERROR_NO_QUESTION_TEXT: &str =
    "It seems we've reached a natural stopping point. Thank you for your time.";

pub const INTERVIEW_CONCLUSION_TEXT: &str = "Thank you for your time. This concludes the interview.";

/// Per-turn coach failure, used by `Coach::evaluate` on its own internal
/// failure (distinct from the orchestrator's "no coach agent" branch below).
pub const COACH_FEEDBACK_ERROR: &str =
    "An error occurred while generating coach feedback for this turn.";
/// Used by the orchestrator when no coach agent is available at all.
pub const COACH_FEEDBACK_UNAVAILABLE: &str =
    "Coach agent was not available to provide feedback for this turn.";

/// Length that question/answer text is truncated to before being stored in
/// a `FeedbackEntry` log.
pub const FEEDBACK_LOG_TRUNCATE_CHARS: usize = 200;
