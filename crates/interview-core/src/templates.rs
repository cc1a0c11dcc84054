// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Prompt templates and generic question data for the Interviewer (C4).
//!
//! Grounded verbatim on `agents/templates/interviewer_templates.py`: the
//! system prompt, next-action prompt (plain and time-aware variants),
//! job-specific question-generation prompt, per-style introduction lines,
//! and the `QUESTION_TEMPLATES`/`TEMPLATE_VARIABLES`/`GENERAL_QUESTIONS`
//! data tables. Substitution is a small `{name}`-placeholder formatter
//! that ignores unknown placeholders defensively, since prompts are
//! treated as data rather than format strings that must match exactly.

use crate::model::InterviewStyle;

pub const INTERVIEWER_SYSTEM_PROMPT: &str = "\
You are an expert AI interviewer for a {job_role} position conducting an interview in a {interview_style} style.

**Core Directives:**
- Your ONLY output should be questions for the candidate or a concluding statement when the interview ends.
- Dynamically adapt your questions based on the candidate's responses, the job description, and their resume.
- Refer to specific points in the candidate's resume ({resume_content}) and the job description ({job_description}) to ask targeted questions.
- Maintain the specified {interview_style} throughout the conversation.
- Do NOT provide any feedback, evaluation, scores, or summaries to the candidate during the interview.
- Aim to ask approximately {target_question_count} questions.";

pub const NEXT_ACTION_TEMPLATE: &str = "\
You are an expert AI interviewer conducting an interview for a {job_role} position, maintaining a {interview_style} style.

Job Description: {job_description}
Candidate Resume: {resume_content}
Target Question Count: {target_question_count}
Questions Asked So Far: {questions_asked_count}
Topics/Skills Covered: {areas_covered_so_far}
Previous Question: {previous_question}
Candidate's Last Answer: {candidate_answer}

Conversation History:
{conversation_history}

Respond ONLY in this JSON format:
{{
    \"action_type\": \"ask_follow_up\" | \"ask_new_question\" | \"end_interview\",
    \"next_question_text\": \"The specific question to ask the candidate (null if action_type is end_interview).\",
    \"justification\": \"Brief internal reasoning for the chosen action and question.\",
    \"newly_covered_topics\": [\"topics\", \"covered\", \"in\", \"the\", \"last\", \"answer\"]
}}";

pub const TIME_AWARE_NEXT_ACTION_TEMPLATE: &str = "\
You are an intelligent interview agent conducting a {interview_style} interview for the role of {job_role}.

Job Description: {job_description}
Candidate Resume: {resume_content}
Difficulty Level: {difficulty_level}

Current Time Phase: {current_time_phase}
Time Progress: {time_progress_percentage}% complete
Remaining Time: {remaining_minutes} minutes
Time Pressure: {time_pressure}
Time-based Suggestions: {time_based_suggestions}

Conversation History:
{conversation_history}

Previous Question: {previous_question}
Candidate's Last Answer: {candidate_answer}
Areas Covered So Far: {areas_covered_so_far}

Respond ONLY in this JSON format:
{{
    \"action_type\": \"ask_new_question\" | \"ask_follow_up\" | \"end_interview\",
    \"next_question_text\": \"Your question here (if asking a question)\",
    \"justification\": \"Your reasoning for this decision, considering time and content factors\",
    \"newly_covered_topics\": [\"list\", \"of\", \"new\", \"topics\"]
}}";

pub const JOB_SPECIFIC_TEMPLATE: &str = "\
You are creating targeted interview questions for a {job_role} position.
Job description: {job_description}
Resume content: {resume_content}

TASK: Generate {num_questions} specific interview questions that assess the key skills and
experiences required for this role, based primarily on the job description and resume.
Range from moderate to challenging difficulty for the {difficulty_level} level, aligned with
the {interview_style} interview style.

FORMAT: Output the questions as a JSON list of strings, nothing else.";

/// Per-style opening remarks. Formatted with `{job_role}`, `{company_name}`,
/// `{interview_duration}`.
pub fn introduction_template(style: InterviewStyle) -> &'static str {
    match style {
        InterviewStyle::Formal => "Thank you for joining me for this interview for the {job_role} position at {company_name}. We'll be discussing your experience and qualifications through about {interview_duration}. I appreciate your time today.",
        InterviewStyle::Casual => "Hi there! Thanks for chatting with me about the {job_role} role at {company_name} today. I'd love to learn more about you through {interview_duration} of conversation. Let's keep this relaxed and informative!",
        InterviewStyle::Technical => "Welcome to this technical interview for the {job_role} position at {company_name}. During our {interview_duration}, I'll be assessing your technical skills and problem-solving abilities through specific scenarios and challenges.",
        InterviewStyle::Aggressive => "Let's begin this interview for the {job_role} position. I have {interview_duration} of challenging questions prepared to thoroughly test your qualifications. I expect precise, substantive answers that demonstrate your expertise.",
    }
}

/// Generic templated questions keyed by style, with `{technology}` /
/// `{scenario}` / `{problem_type}` / `{challenge}` / `{quality_aspect}`
/// placeholders filled from [`template_variables_for`].
pub fn question_templates(style: InterviewStyle) -> &'static [&'static str] {
    match style {
        InterviewStyle::Formal => &[
            "Can you describe your experience with {technology}?",
            "How would you approach a situation where {scenario}?",
            "What methodology would you use to solve {problem_type} problems?",
            "Describe a time when you had to {challenge}. How did you handle it?",
            "How do you ensure {quality_aspect} in your work?",
        ],
        InterviewStyle::Casual => &[
            "Tell me about a time you worked with {technology}. How did it go?",
            "What would you do if {scenario}?",
            "How do you typically tackle {problem_type} problems?",
            "Have you ever had to {challenge}? What happened?",
            "How do you make sure your work is {quality_aspect}?",
        ],
        InterviewStyle::Aggressive => &[
            "Prove to me you have experience with {technology}.",
            "What exactly would you do if {scenario}? Be specific.",
            "I need to know exactly how you would solve {problem_type} problems. Details.",
            "Give me a specific example of when you {challenge}. What exactly did you do?",
            "How specifically do you ensure {quality_aspect}? Don't give me generalities.",
        ],
        InterviewStyle::Technical => &[
            "Explain the key concepts of {technology} and how you've implemented them.",
            "What is your approach to {scenario} from a technical perspective?",
            "Walk me through your process for solving {problem_type} problems, including any algorithms or data structures you would use.",
            "Describe a technical challenge where you had to {challenge}. What was your solution?",
            "What metrics and tools do you use to ensure {quality_aspect} in your technical work?",
        ],
    }
}

/// Role-specific fill-in values for the question templates above. Falls
/// back to the "Software Engineer" set when the role isn't in the table.
pub struct TemplateVariables {
    pub technology: &'static [&'static str],
    pub scenario: &'static [&'static str],
    pub problem_type: &'static [&'static str],
    pub challenge: &'static [&'static str],
    pub quality_aspect: &'static [&'static str],
}

const SOFTWARE_ENGINEER_VARS: TemplateVariables = TemplateVariables {
    technology: &["React", "Python", "cloud infrastructure", "REST APIs", "microservices"],
    scenario: &["production system failure", "changing requirements", "performance optimization"],
    problem_type: &["algorithmic", "debugging", "system design"],
    challenge: &["lead a project", "mentor juniors", "meet tight deadlines"],
    quality_aspect: &["code quality", "test coverage", "reliability"],
};

const DATA_SCIENTIST_VARS: TemplateVariables = TemplateVariables {
    technology: &["Python for data analysis", "machine learning frameworks", "data visualization"],
    scenario: &["incomplete data", "explaining results", "poor model performance"],
    problem_type: &["prediction", "classification", "clustering"],
    challenge: &["clean messy data", "deploy a model", "interpret complex results"],
    quality_aspect: &["model accuracy", "reproducibility", "interpretability"],
};

pub fn template_variables_for(job_role: &str) -> &'static TemplateVariables {
    match job_role.trim().to_ascii_lowercase().as_str() {
        "data scientist" => &DATA_SCIENTIST_VARS,
        _ => &SOFTWARE_ENGINEER_VARS,
    }
}

/// Role-agnostic fallback questions, formatted with `{job_role}`.
pub const GENERAL_QUESTIONS: &[&str] = &[
    "What attracted you to this position?",
    "Where do you see yourself professionally in five years?",
    "Why do you think you're a good fit for this {job_role}?",
    "Describe your ideal work environment.",
    "How do you stay updated with the latest developments in your field?",
];

/// Substitute `{name}` placeholders from `vars`, leaving unknown
/// placeholders untouched rather than erroring.
pub fn format_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_template_substitutes_known_placeholders() {
        let out = format_template("Hello {name}, welcome to {place}", &[("name", "Ada"), ("place", "Rust")]);
        assert_eq!(out, "Hello Ada, welcome to Rust");
    }

    #[test]
    fn format_template_ignores_unknown_placeholders() {
        let out = format_template("Hello {name}, {unknown}", &[("name", "Ada")]);
        assert_eq!(out, "Hello Ada, {unknown}");
    }

    #[test]
    fn unknown_job_role_falls_back_to_software_engineer_vars() {
        let vars = template_variables_for("Underwater Basket Weaver");
        assert_eq!(vars.technology, SOFTWARE_ENGINEER_VARS.technology);
    }

    #[test]
    fn data_scientist_role_uses_its_own_vars() {
        let vars = template_variables_for("Data Scientist");
        assert_eq!(vars.problem_type, DATA_SCIENTIST_VARS.problem_type);
    }

    #[test]
    fn every_style_has_introduction_and_question_templates() {
        for style in [
            InterviewStyle::Formal,
            InterviewStyle::Casual,
            InterviewStyle::Aggressive,
            InterviewStyle::Technical,
        ] {
            assert!(!introduction_template(style).is_empty());
            assert_eq!(question_templates(style).len(), 5);
        }
    }
}
