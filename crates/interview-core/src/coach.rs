// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Coach Evaluator (C5) — per-turn feedback and the end-of-interview
//! summary with sourced learning resources.
//!
//! Grounded on `agents/agentic_coach.py`'s `AgenticCoach`: per-turn
//! feedback is a single short LLM call; the final summary runs a short
//! pipeline — digest the transcript, ask the LLM for patterns/strengths/
//! weaknesses and a topic list, determine a proficiency level per topic,
//! search for resources per topic bounded by a topic-count-aware budget,
//! and fall back to a small fixed resource list if nothing comes back
//! from search.

use serde::Deserialize;

use interview_model::{CompletionRequest, LlmProvider, Message as LlmMessage};

use crate::constants::{COACH_FEEDBACK_ERROR, FEEDBACK_LOG_TRUNCATE_CHARS};
use crate::json_util::parse_tolerant_or;
use crate::model::{FeedbackEntry, Message, Resource, ResourceType, Summary};
use crate::search::{search_resources, SearchProvider};

const FEEDBACK_PROMPT_TEMPLATE: &str = "\
You are a supportive but honest interview coach. The candidate is interviewing for a {job_role} position.

Question asked: {question}
Candidate's answer: {answer}

In 2-3 sentences, give direct, specific feedback on this single answer: what was strong, and
what could be improved. Do not repeat the question or the answer back verbatim.";

const SUMMARY_PROMPT_TEMPLATE: &str = "\
You are an expert interview coach reviewing a completed {job_role} interview.

Transcript:
{transcript}

Per-turn feedback already given:
{feedback_digest}

Respond ONLY in this JSON format:
{{
    \"patterns_tendencies\": \"Observed patterns across the candidate's answers\",
    \"strengths\": \"Concrete strengths demonstrated\",
    \"weaknesses\": \"Concrete areas that need work\",
    \"improvement_focus_areas\": \"What the candidate should focus on improving\",
    \"search_topics\": [\"topic one\", \"topic two\"]
}}";

#[derive(Debug, Deserialize, Default)]
struct SummaryDraft {
    #[serde(default)]
    patterns_tendencies: String,
    #[serde(default)]
    strengths: String,
    #[serde(default)]
    weaknesses: String,
    #[serde(default)]
    improvement_focus_areas: String,
    #[serde(default)]
    search_topics: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Proficiency {
    Beginner,
    Intermediate,
    Advanced,
}

pub struct Coach;

impl Coach {
    pub fn new() -> Self {
        Self
    }

    /// Produce one [`FeedbackEntry`] for a single question/answer turn.
    /// Question and answer text are truncated before storage, matching
    /// the transcript-log size discipline of the original feedback log.
    pub async fn evaluate(&self, provider: &dyn LlmProvider, job_role: &str, question: &str, answer: &str) -> FeedbackEntry {
        let prompt = crate::templates::format_template(
            FEEDBACK_PROMPT_TEMPLATE,
            &[("job_role", job_role), ("question", question), ("answer", answer)],
        );
        let req = CompletionRequest {
            messages: vec![LlmMessage::user(prompt)],
            temperature: Some(0.5),
            max_tokens: Some(200),
        };
        let feedback = provider
            .complete_text(req)
            .await
            .unwrap_or_else(|_| COACH_FEEDBACK_ERROR.to_string());

        FeedbackEntry {
            question: truncate(question, FEEDBACK_LOG_TRUNCATE_CHARS),
            answer: truncate(answer, FEEDBACK_LOG_TRUNCATE_CHARS),
            feedback,
        }
    }

    /// Build the end-of-interview [`Summary`], sourcing resources for up
    /// to a handful of topics drawn from the candidate's weak areas.
    pub async fn final_summary(
        &self,
        provider: &dyn LlmProvider,
        search: &dyn SearchProvider,
        job_role: &str,
        history: &[Message],
        feedback: &[FeedbackEntry],
    ) -> Summary {
        if history.is_empty() {
            return Summary {
                patterns_tendencies: String::new(),
                strengths: String::new(),
                weaknesses: String::new(),
                improvement_focus_areas: String::new(),
                recommended_resources: fallback_resources(),
                error: Some("No conversation history to summarize.".to_string()),
            };
        }

        let transcript = render_transcript(history);
        let feedback_digest = render_feedback_digest(feedback);

        let prompt = crate::templates::format_template(
            SUMMARY_PROMPT_TEMPLATE,
            &[("job_role", job_role), ("transcript", &transcript), ("feedback_digest", &feedback_digest)],
        );
        let req = CompletionRequest {
            messages: vec![LlmMessage::user(prompt)],
            temperature: Some(0.4),
            max_tokens: Some(700),
        };

        let draft = match provider.complete_text(req).await {
            Ok(text) => parse_tolerant_or(&text, SummaryDraft::default()),
            Err(_) => SummaryDraft::default(),
        };

        if draft.patterns_tendencies.is_empty() && draft.strengths.is_empty() && draft.weaknesses.is_empty() {
            return Summary {
                patterns_tendencies: String::new(),
                strengths: String::new(),
                weaknesses: String::new(),
                improvement_focus_areas: String::new(),
                recommended_resources: fallback_resources(),
                error: Some("Coach summary could not be generated for this interview.".to_string()),
            };
        }

        let resources = self.gather_resources(search, &draft).await;

        Summary {
            patterns_tendencies: draft.patterns_tendencies,
            strengths: draft.strengths,
            weaknesses: draft.weaknesses,
            improvement_focus_areas: draft.improvement_focus_areas,
            recommended_resources: resources,
            error: None,
        }
    }

    async fn gather_resources(&self, search: &dyn SearchProvider, draft: &SummaryDraft) -> Vec<Resource> {
        if draft.search_topics.is_empty() {
            return fallback_resources();
        }

        let topic_count = draft.search_topics.len();
        let max_per_topic = (6 / topic_count).clamp(1, 2);
        let max_total = (topic_count * 2).min(6);

        let mut resources = Vec::new();
        for topic in &draft.search_topics {
            if resources.len() >= max_total {
                break;
            }
            let proficiency = proficiency_for(topic, &draft.weaknesses);
            let resource_type = resource_type_for(proficiency);
            let remaining = max_total - resources.len();
            let take = max_per_topic.min(remaining);

            let mut found = search_resources(search, topic, take, resource_type).await;
            for r in &mut found {
                r.reasoning = reasoning_for(resource_type, topic);
            }
            resources.extend(found);
        }

        if resources.is_empty() {
            fallback_resources()
        } else {
            resources
        }
    }
}

impl Default for Coach {
    fn default() -> Self {
        Self::new()
    }
}

fn proficiency_for(topic: &str, weaknesses: &str) -> Proficiency {
    let topic_lower = topic.to_ascii_lowercase();
    if topic_lower.contains("basic") || topic_lower.contains("fundamental") {
        return Proficiency::Beginner;
    }
    if topic_lower.contains("advanced") || topic_lower.contains("complex") {
        return Proficiency::Advanced;
    }
    if weaknesses.to_ascii_lowercase().contains(&topic_lower) {
        return Proficiency::Beginner;
    }
    Proficiency::Intermediate
}

fn resource_type_for(proficiency: Proficiency) -> ResourceType {
    match proficiency {
        Proficiency::Beginner => ResourceType::Tutorial,
        Proficiency::Intermediate => ResourceType::Article,
        Proficiency::Advanced => ResourceType::Documentation,
    }
}

fn reasoning_for(resource_type: ResourceType, topic: &str) -> String {
    match resource_type {
        ResourceType::Course => format!("A structured course to build a complete foundation in {topic}."),
        ResourceType::Tutorial => format!("A hands-on tutorial to practice the fundamentals of {topic}."),
        ResourceType::Documentation => format!("Authoritative reference material for {topic} once you've found the basics."),
        ResourceType::Article => format!("A focused article covering {topic} in more depth."),
        ResourceType::Video => format!("A video walkthrough for a more visual introduction to {topic}."),
        ResourceType::Interactive => format!("An interactive exercise to practice {topic} hands-on."),
        ResourceType::Community => format!("A community resource where you can ask questions about {topic}."),
        ResourceType::Book => format!("A deeper reference for {topic}."),
    }
}

fn fallback_resources() -> Vec<Resource> {
    vec![
        Resource {
            title: "freeCodeCamp".to_string(),
            url: "https://www.freecodecamp.org".to_string(),
            description: "Free, project-based courses across web development and computer science fundamentals.".to_string(),
            resource_type: ResourceType::Course,
            reasoning: "A solid general starting point when a specific topic search turns up nothing.".to_string(),
            relevance_score: None,
            metadata: None,
        },
        Resource {
            title: "MDN Web Docs".to_string(),
            url: "https://developer.mozilla.org".to_string(),
            description: "Comprehensive, vendor-neutral reference documentation for web technologies.".to_string(),
            resource_type: ResourceType::Documentation,
            reasoning: "Authoritative reference material to fall back on.".to_string(),
            relevance_score: None,
            metadata: None,
        },
        Resource {
            title: "Official documentation for your stack".to_string(),
            url: "https://devdocs.io".to_string(),
            description: "A general pointer toward the official documentation for whatever technology came up.".to_string(),
            resource_type: ResourceType::Documentation,
            reasoning: "When no topic-specific resource can be sourced, start with the official docs.".to_string(),
            relevance_score: None,
            metadata: None,
        },
    ]
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

fn render_transcript(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| format!("{:?}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_feedback_digest(feedback: &[FeedbackEntry]) -> String {
    if feedback.is_empty() {
        return "None".to_string();
    }
    feedback
        .iter()
        .map(|f| format!("Q: {}\nFeedback: {}", f.question, f.feedback))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{FixedSearchProvider, SearchHit};
    use interview_model::{MockProvider, ScriptedMockProvider};

    #[tokio::test]
    async fn evaluate_truncates_long_question_and_answer() {
        let coach = Coach::new();
        let provider = MockProvider;
        let long = "x".repeat(FEEDBACK_LOG_TRUNCATE_CHARS + 50);
        let entry = coach.evaluate(&provider, "Engineer", &long, &long).await;
        assert_eq!(entry.question.chars().count(), FEEDBACK_LOG_TRUNCATE_CHARS);
        assert_eq!(entry.answer.chars().count(), FEEDBACK_LOG_TRUNCATE_CHARS);
    }

    #[tokio::test]
    async fn evaluate_falls_back_to_constant_on_provider_failure() {
        struct Failing;
        #[async_trait::async_trait]
        impl LlmProvider for Failing {
            fn name(&self) -> &str {
                "failing"
            }
            async fn complete(&self, _req: CompletionRequest) -> anyhow::Result<interview_model::ResponseStream> {
                anyhow::bail!("provider down")
            }
        }
        let coach = Coach::new();
        let entry = coach.evaluate(&Failing, "Engineer", "q", "a").await;
        assert_eq!(entry.feedback, COACH_FEEDBACK_ERROR);
    }

    #[tokio::test]
    async fn final_summary_falls_back_to_fixed_resources_when_search_finds_nothing() {
        let coach = Coach::new();
        let provider = ScriptedMockProvider::always_text(
            r#"{"patterns_tendencies": "p", "strengths": "s", "weaknesses": "w", "improvement_focus_areas": "i", "search_topics": ["rust basics"]}"#,
        );
        let search = FixedSearchProvider { hits: vec![] };
        let summary = coach.final_summary(&provider, &search, "Engineer", &[], &[]).await;
        assert_eq!(summary.recommended_resources.len(), 3);
        assert!(summary.error.is_none());
    }

    #[tokio::test]
    async fn final_summary_uses_search_results_when_available() {
        let coach = Coach::new();
        let provider = ScriptedMockProvider::always_text(
            r#"{"patterns_tendencies": "p", "strengths": "s", "weaknesses": "struggled with rust basics", "improvement_focus_areas": "i", "search_topics": ["rust basics"]}"#,
        );
        let search = FixedSearchProvider {
            hits: vec![SearchHit {
                title: "Learn Rust".to_string(),
                url: "https://doc.rust-lang.org/book".to_string(),
                description: "The official Rust book".to_string(),
            }],
        };
        let summary = coach.final_summary(&provider, &search, "Engineer", &[], &[]).await;
        assert_eq!(summary.recommended_resources.len(), 1);
        assert_eq!(summary.recommended_resources[0].resource_type, ResourceType::Tutorial);
    }

    #[tokio::test]
    async fn final_summary_reports_error_when_llm_output_is_unusable() {
        let coach = Coach::new();
        let provider = ScriptedMockProvider::always_text("complete garbage, not json");
        let search = FixedSearchProvider { hits: vec![] };
        let summary = coach.final_summary(&provider, &search, "Engineer", &[], &[]).await;
        assert!(summary.error.is_some());
        assert_eq!(summary.recommended_resources.len(), 3);
    }

    #[tokio::test]
    async fn final_summary_returns_default_on_empty_history() {
        let coach = Coach::new();
        let provider = MockProvider;
        let search = FixedSearchProvider { hits: vec![] };
        let summary = coach.final_summary(&provider, &search, "Engineer", &[], &[]).await;
        assert!(summary.error.is_some());
        assert_eq!(summary.recommended_resources.len(), 3);
    }

    #[test]
    fn proficiency_precedence_matches_expected_ordering() {
        assert_eq!(proficiency_for("basic loops", "advanced topics"), Proficiency::Beginner);
        assert_eq!(proficiency_for("advanced concurrency", ""), Proficiency::Advanced);
        assert_eq!(proficiency_for("closures", "struggled with closures and ownership"), Proficiency::Beginner);
        assert_eq!(proficiency_for("testing", "struggled with closures"), Proficiency::Intermediate);
    }
}
