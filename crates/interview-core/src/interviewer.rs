// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Interviewer (C4) — the per-session question-asking state machine.
//!
//! Grounded on `agents/interview_state.py`'s `InterviewAgent`: a one-way
//! phase progression (`initializing` → `introducing` → `questioning` →
//! `completed`, reversible only by a full `reset`), a question bank built
//! once at session start from a default opener, LLM-generated job-specific
//! questions, and a templated backfill, and a per-turn "what happens
//! next" decision obtained by asking the LLM provider for a small JSON
//! verdict and then running it through a handful of guard rules before
//! acting on it.

use rand::seq::SliceRandom;

use interview_model::{CompletionRequest, LlmProvider, Message as LlmMessage};

use crate::constants::*;
use crate::error::{CoreError, CoreResult};
use crate::json_util::parse_tolerant_or;
use crate::model::{
    ActionType, AgentResponse, AgentTag, InterviewPhase, InterviewStyle, InterviewerState, Message,
    MessageRole, NextActionDecision, ResponseType, SessionConfig, TimeContext, TimePressure,
};
use crate::templates;

/// How many job-specific questions the LLM is asked to draft at session
/// start, independent of how many actually survive dedup/truncation.
const JOB_SPECIFIC_DRAFT_COUNT: usize = 8;

pub struct Interviewer {
    config: SessionConfig,
    state: InterviewerState,
    question_bank: Vec<String>,
    bank_cursor: usize,
}

impl Interviewer {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: InterviewerState::default(),
            question_bank: Vec::new(),
            bank_cursor: 0,
        }
    }

    pub fn state(&self) -> &InterviewerState {
        &self.state
    }

    pub fn restore(config: SessionConfig, state: InterviewerState, question_bank: Vec<String>) -> Self {
        let bank_cursor = state.asked_question_count.saturating_sub(1).min(question_bank.len());
        Self { config, state, question_bank, bank_cursor }
    }

    pub fn question_bank(&self) -> &[String] {
        &self.question_bank
    }

    /// Config can be updated mid-session (e.g. style/difficulty changed by
    /// the client); the question bank and phase are left untouched so an
    /// in-flight interview doesn't jump backward.
    pub fn on_config_update(&mut self, config: SessionConfig) {
        self.config = config;
    }

    /// Build the introduction message and the question bank, and advance
    /// from `Initializing` straight through `Introducing` into
    /// `Questioning`, returning the introduction as the first turn out.
    pub async fn initialize(&mut self, provider: &dyn LlmProvider) -> CoreResult<AgentResponse> {
        self.question_bank = self.build_question_bank(provider).await;
        self.state.phase = InterviewPhase::Introducing;

        let intro_template = templates::introduction_template(self.config.style);
        let duration_text = match self.config.interview_duration_minutes {
            Some(m) => format!("about {m} minutes"),
            None => "a focused session".to_string(),
        };
        let intro = templates::format_template(
            intro_template,
            &[
                ("job_role", &self.config.job_role),
                ("company_name", self.config.company_name.as_deref().unwrap_or(DEFAULT_COMPANY_NAME)),
                ("interview_duration", &duration_text),
            ],
        );

        self.state.phase = InterviewPhase::Questioning;
        let opening = self.next_bank_question().unwrap_or_else(|| DEFAULT_OPENING_QUESTION.to_string());
        self.state.ask_question(&opening);

        let content = format!("{intro}\n\n{opening}");
        Ok(AgentResponse::new(content, AgentTag::Interviewer, ResponseType::Introduction))
    }

    /// Process one candidate answer and decide the next turn. `history`
    /// is the full prior conversation, used as LLM context.
    pub async fn process(
        &mut self,
        provider: &dyn LlmProvider,
        history: &[Message],
        candidate_answer: &str,
        time_context: Option<&TimeContext>,
    ) -> CoreResult<AgentResponse> {
        if self.state.phase == InterviewPhase::Completed {
            return Ok(AgentResponse::new(
                INTERVIEW_CONCLUSION_TEXT,
                AgentTag::Interviewer,
                ResponseType::Closing,
            ));
        }

        let decision = self.decide_next_action(provider, history, candidate_answer, time_context).await;
        let decision = self.apply_guards(decision, time_context);

        self.state.add_covered_topics(&decision.newly_covered_topics);

        match decision_action(&decision) {
            ActionType::EndInterview => {
                self.state.phase = InterviewPhase::Completed;
                Ok(AgentResponse::new(
                    INTERVIEW_CONCLUSION_TEXT,
                    AgentTag::Interviewer,
                    ResponseType::Closing,
                ))
            }
            ActionType::AskFollowUp | ActionType::AskNewQuestion => {
                let question = decision
                    .next_question_text
                    .clone()
                    .filter(|q| !q.trim().is_empty())
                    .unwrap_or(ERROR_NO_QUESTION_TEXT.to_string());
                self.state.ask_question(&question);
                Ok(AgentResponse::new(question, AgentTag::Interviewer, ResponseType::Question))
            }
        }
    }

    async fn decide_next_action(
        &self,
        provider: &dyn LlmProvider,
        history: &[Message],
        candidate_answer: &str,
        time_context: Option<&TimeContext>,
    ) -> NextActionDecision {
        let conversation_history = render_history(history);
        let previous_question = self.state.current_question.clone().unwrap_or_default();

        let prompt = match time_context {
            Some(ctx) if self.config.time_based => templates::format_template(
                templates::TIME_AWARE_NEXT_ACTION_TEMPLATE,
                &[
                    ("interview_style", &style_name(self.config.style)),
                    ("job_role", &self.config.job_role),
                    ("job_description", self.config.job_description.as_deref().unwrap_or(DEFAULT_VALUE_NOT_PROVIDED)),
                    ("resume_content", self.config.resume_content.as_deref().unwrap_or(DEFAULT_VALUE_NOT_PROVIDED)),
                    ("difficulty_level", &self.config.difficulty),
                    ("current_time_phase", &format!("{:?}", ctx.current_phase)),
                    ("time_progress_percentage", &format!("{:.0}", ctx.progress_percentage)),
                    ("remaining_minutes", &format!("{:.1}", ctx.remaining_minutes)),
                    ("time_pressure", &format!("{:?}", ctx.time_pressure)),
                    ("time_based_suggestions", &ctx.suggested_actions.join("; ")),
                    ("conversation_history", &conversation_history),
                    ("previous_question", &previous_question),
                    ("candidate_answer", candidate_answer),
                    ("areas_covered_so_far", &self.state.covered_topics_str()),
                ],
            ),
            _ => templates::format_template(
                templates::NEXT_ACTION_TEMPLATE,
                &[
                    ("job_role", &self.config.job_role),
                    ("interview_style", &style_name(self.config.style)),
                    ("job_description", self.config.job_description.as_deref().unwrap_or(DEFAULT_VALUE_NOT_PROVIDED)),
                    ("resume_content", self.config.resume_content.as_deref().unwrap_or(DEFAULT_VALUE_NOT_PROVIDED)),
                    ("target_question_count", &self.config.target_question_count.to_string()),
                    ("questions_asked_count", &self.state.asked_question_count.to_string()),
                    ("areas_covered_so_far", &self.state.covered_topics_str()),
                    ("previous_question", &previous_question),
                    ("candidate_answer", candidate_answer),
                    ("conversation_history", &conversation_history),
                ],
            ),
        };

        let req = CompletionRequest {
            messages: vec![
                LlmMessage::system(templates::format_template(
                    templates::INTERVIEWER_SYSTEM_PROMPT,
                    &[
                        ("job_role", &self.config.job_role),
                        ("interview_style", &style_name(self.config.style)),
                        ("resume_content", self.config.resume_content.as_deref().unwrap_or(DEFAULT_VALUE_NOT_PROVIDED)),
                        ("job_description", self.config.job_description.as_deref().unwrap_or(DEFAULT_VALUE_NOT_PROVIDED)),
                        ("target_question_count", &self.config.target_question_count.to_string()),
                    ],
                )),
                LlmMessage::user(prompt),
            ],
            temperature: Some(0.7),
            max_tokens: Some(400),
        };

        match provider.complete_text(req).await {
            Ok(text) => parse_tolerant_or(&text, NextActionDecision::default()),
            Err(_) => NextActionDecision::default(),
        }
    }

    /// Guard rules applied after the LLM verdict, before it's acted on:
    ///
    /// 1. The interview can never end early, but what "early" means
    ///    depends on pacing mode: time-based sessions require
    ///    `progress_percentage >= 70%` before an end verdict is honored;
    ///    count-based sessions require `minimum_question_count` questions
    ///    to have been asked. Either way a premature end verdict is
    ///    downgraded to `ask_new_question`.
    /// 2. Once `target_question_count` is reached, a new-question verdict
    ///    is downgraded to ending, since the model has no hard stop of
    ///    its own.
    /// 3. When time-based pacing is on and the remaining time is critically
    ///    short, any pending new-question verdict is ended early instead.
    /// 4. An ask verdict with no question text pulls the next question
    ///    from the pre-built bank instead of leaving the candidate with
    ///    nothing to answer.
    /// 5. If the question bank is exhausted and the model still wants to
    ///    ask something new, the interview ends instead of repeating a
    ///    question or asking with empty text.
    fn apply_guards(
        &mut self,
        mut decision: NextActionDecision,
        time_context: Option<&TimeContext>,
    ) -> NextActionDecision {
        let action = decision_action(&decision);

        if action == ActionType::EndInterview {
            if self.config.time_based {
                let progress_ok = time_context.map(|ctx| ctx.progress_percentage >= 70.0).unwrap_or(false);
                if !progress_ok {
                    decision.action_type = Some("ask_new_question".to_string());
                }
            } else if !self.state.can_end_interview(MINIMUM_QUESTION_COUNT.max(self.minimum_question_count())) {
                decision.action_type = Some("ask_new_question".to_string());
            }
        }

        let action = decision_action(&decision);

        if action != ActionType::EndInterview && self.state.asked_question_count >= self.config.target_question_count {
            decision.action_type = Some("end_interview".to_string());
            decision.next_question_text = None;
        }

        if let Some(ctx) = time_context {
            if self.config.time_based
                && ctx.time_pressure == TimePressure::High
                && ctx.remaining_minutes < 1.0
                && decision_action(&decision) != ActionType::EndInterview
            {
                decision.action_type = Some("end_interview".to_string());
                decision.next_question_text = None;
            }
        }

        let action = decision_action(&decision);
        if matches!(action, ActionType::AskFollowUp | ActionType::AskNewQuestion)
            && decision.next_question_text.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            match self.next_bank_question() {
                Some(q) => decision.next_question_text = Some(q),
                None => {
                    decision.action_type = Some("end_interview".to_string());
                    decision.next_question_text = None;
                }
            }
        }

        decision
    }

    fn minimum_question_count(&self) -> usize {
        MINIMUM_QUESTION_COUNT
    }

    fn next_bank_question(&mut self) -> Option<String> {
        let q = self.question_bank.get(self.bank_cursor).cloned();
        if q.is_some() {
            self.bank_cursor += 1;
        }
        q
    }

    /// Assemble the question bank: a fixed opener, LLM-drafted
    /// job-specific questions, templated questions filled in with
    /// role-specific variables, and role-agnostic general questions,
    /// deduplicated, shuffled, and truncated to roughly
    /// `target_question_count` entries. Falls back entirely to the
    /// templated/general pool if the LLM call fails outright.
    async fn build_question_bank(&self, provider: &dyn LlmProvider) -> Vec<String> {
        let mut bank = vec![DEFAULT_OPENING_QUESTION.to_string()];

        let job_specific = self.draft_job_specific_questions(provider).await;
        bank.extend(job_specific);

        let vars = templates::template_variables_for(&self.config.job_role);
        for (i, template) in templates::question_templates(self.config.style).iter().enumerate() {
            let filled = templates::format_template(
                template,
                &[
                    ("technology", pick(vars.technology, i)),
                    ("scenario", pick(vars.scenario, i)),
                    ("problem_type", pick(vars.problem_type, i)),
                    ("challenge", pick(vars.challenge, i)),
                    ("quality_aspect", pick(vars.quality_aspect, i)),
                ],
            );
            bank.push(filled);
        }

        for q in templates::GENERAL_QUESTIONS {
            bank.push(templates::format_template(q, &[("job_role", &self.config.job_role)]));
        }

        dedupe_preserving_order(&mut bank);

        if bank.len() <= 1 {
            bank.push(DEFAULT_FALLBACK_QUESTION.to_string());
        }

        let mut rng = rand::thread_rng();
        let (opener, rest) = bank.split_at(1);
        let mut rest = rest.to_vec();
        rest.shuffle(&mut rng);

        let mut out = opener.to_vec();
        out.extend(rest);
        out.truncate(self.config.target_question_count.max(MINIMUM_QUESTION_COUNT));
        out
    }

    async fn draft_job_specific_questions(&self, provider: &dyn LlmProvider) -> Vec<String> {
        let prompt = templates::format_template(
            templates::JOB_SPECIFIC_TEMPLATE,
            &[
                ("job_role", &self.config.job_role),
                ("job_description", self.config.job_description.as_deref().unwrap_or(DEFAULT_VALUE_NOT_PROVIDED)),
                ("resume_content", self.config.resume_content.as_deref().unwrap_or(DEFAULT_VALUE_NOT_PROVIDED)),
                ("num_questions", &JOB_SPECIFIC_DRAFT_COUNT.to_string()),
                ("difficulty_level", &self.config.difficulty),
                ("interview_style", &style_name(self.config.style)),
            ],
        );

        let req = CompletionRequest {
            messages: vec![LlmMessage::user(prompt)],
            temperature: Some(0.8),
            max_tokens: Some(600),
        };

        match provider.complete_text(req).await {
            Ok(text) => parse_tolerant_or::<Vec<String>>(&text, Vec::new()),
            Err(_) => Vec::new(),
        }
    }
}

fn decision_action(decision: &NextActionDecision) -> ActionType {
    match decision.action_type.as_deref() {
        Some("end_interview") => ActionType::EndInterview,
        Some("ask_follow_up") => ActionType::AskFollowUp,
        _ => ActionType::AskNewQuestion,
    }
}

fn style_name(style: InterviewStyle) -> String {
    format!("{style:?}").to_lowercase()
}

fn pick<'a>(options: &'a [&'a str], i: usize) -> &'a str {
    options.get(i % options.len().max(1)).copied().unwrap_or("")
}

fn dedupe_preserving_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|q| seen.insert(q.clone()));
}

fn render_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| match m.role {
            MessageRole::User => format!("Candidate: {}", m.content),
            MessageRole::Assistant => format!("Interviewer: {}", m.content),
            MessageRole::System => String::new(),
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convert a [`CoreError`] carrying upstream provider failure text into a
/// uniform "processing error" shown to the candidate, never the raw
/// provider error.
pub fn user_facing_error(_err: &CoreError) -> &'static str {
    ERROR_PROCESSING_REQUEST
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_model::{MockProvider, ScriptedMockProvider};

    fn config() -> SessionConfig {
        SessionConfig {
            target_question_count: 4,
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn initialize_produces_an_introduction_and_first_question() {
        let mut interviewer = Interviewer::new(config());
        let provider = MockProvider;
        let response = interviewer.initialize(&provider).await.unwrap();
        assert_eq!(response.response_type, ResponseType::Introduction);
        assert_eq!(interviewer.state().phase, InterviewPhase::Questioning);
        assert_eq!(interviewer.state().asked_question_count, 1);
    }

    #[tokio::test]
    async fn process_on_malformed_llm_output_falls_back_to_default_decision() {
        let mut interviewer = Interviewer::new(config());
        let provider = ScriptedMockProvider::always_text("not json at all");
        interviewer.initialize(&provider).await.unwrap();
        let response = interviewer.process(&provider, &[], "my answer", None).await.unwrap();
        assert_eq!(response.response_type, ResponseType::Question);
    }

    #[tokio::test]
    async fn cannot_end_before_minimum_question_count_in_count_based_mode() {
        let mut interviewer =
            Interviewer::new(SessionConfig { time_based: false, ..config() });
        let provider = ScriptedMockProvider::always_text(
            r#"{"action_type": "end_interview", "next_question_text": null, "justification": "done", "newly_covered_topics": []}"#,
        );
        interviewer.initialize(&provider).await.unwrap();
        let response = interviewer.process(&provider, &[], "answer", None).await.unwrap();
        assert_eq!(response.response_type, ResponseType::Question);
        assert_eq!(interviewer.state().phase, InterviewPhase::Questioning);
    }

    fn time_context(progress_percentage: f64) -> TimeContext {
        TimeContext {
            total_duration_minutes: 10,
            elapsed_minutes: 5.0,
            remaining_minutes: 5.0,
            progress_percentage,
            current_phase: crate::model::TimePhase::Exploration,
            phase_progress: 0.5,
            time_pressure: TimePressure::Medium,
            suggested_actions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn cannot_end_before_seventy_percent_progress_in_time_based_mode() {
        let mut interviewer = Interviewer::new(SessionConfig { time_based: true, ..config() });
        let provider = ScriptedMockProvider::always_text(
            r#"{"action_type": "end_interview", "next_question_text": null, "justification": "done", "newly_covered_topics": []}"#,
        );
        interviewer.initialize(&provider).await.unwrap();
        let ctx = time_context(40.0);
        let response = interviewer.process(&provider, &[], "answer", Some(&ctx)).await.unwrap();
        assert_eq!(response.response_type, ResponseType::Question);
        assert_eq!(interviewer.state().phase, InterviewPhase::Questioning);
    }

    #[tokio::test]
    async fn ends_on_request_past_seventy_percent_progress_in_time_based_mode() {
        let mut interviewer = Interviewer::new(SessionConfig { time_based: true, ..config() });
        let provider = ScriptedMockProvider::always_text(
            r#"{"action_type": "end_interview", "next_question_text": null, "justification": "done", "newly_covered_topics": []}"#,
        );
        interviewer.initialize(&provider).await.unwrap();
        let ctx = time_context(85.0);
        let response = interviewer.process(&provider, &[], "answer", Some(&ctx)).await.unwrap();
        assert_eq!(response.response_type, ResponseType::Closing);
        assert_eq!(interviewer.state().phase, InterviewPhase::Completed);
    }

    #[tokio::test]
    async fn ends_once_target_question_count_is_reached() {
        let mut interviewer = Interviewer::new(SessionConfig { target_question_count: 1, ..config() });
        let provider = ScriptedMockProvider::always_text(
            r#"{"action_type": "ask_new_question", "next_question_text": "another one?", "justification": "", "newly_covered_topics": []}"#,
        );
        interviewer.initialize(&provider).await.unwrap();
        let response = interviewer.process(&provider, &[], "answer", None).await.unwrap();
        assert_eq!(response.response_type, ResponseType::Closing);
        assert_eq!(interviewer.state().phase, InterviewPhase::Completed);
    }

    #[tokio::test]
    async fn completed_phase_is_idempotent() {
        let mut interviewer = Interviewer::new(SessionConfig { target_question_count: 1, ..config() });
        let provider = MockProvider;
        interviewer.initialize(&provider).await.unwrap();
        let _ = interviewer.process(&provider, &[], "answer", None).await.unwrap();
        let second = interviewer.process(&provider, &[], "anything else", None).await.unwrap();
        assert_eq!(second.response_type, ResponseType::Closing);
    }

    #[test]
    fn question_bank_is_built_without_duplicates() {
        let mut bank = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        dedupe_preserving_order(&mut bank);
        assert_eq!(bank, vec!["a".to_string(), "b".to_string()]);
    }
}
