// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Tolerant JSON extraction for LLM responses.
//!
//! Models are asked to reply with a single JSON object but routinely wrap
//! it in a fenced code block, prefix it with a sentence, or otherwise emit
//! near-JSON. This tries strict parsing first, then strips the first
//! fenced code block it finds, then falls back to scanning for the
//! outermost `{...}` span, so a caller only has to provide a serde
//! `Deserialize` target and a default to fall back on.

use serde::de::DeserializeOwned;

/// Attempt strict parse, then fenced-code-block extraction, then
/// brace-scanning extraction. Returns `None` if nothing parses.
pub fn parse_tolerant<T: DeserializeOwned>(text: &str) -> Option<T> {
    if let Ok(v) = serde_json::from_str::<T>(text.trim()) {
        return Some(v);
    }
    if let Some(fenced) = extract_fenced_json(text) {
        if let Ok(v) = serde_json::from_str::<T>(&fenced) {
            return Some(v);
        }
    }
    if let Some(braced) = extract_outermost_braces(text) {
        if let Ok(v) = serde_json::from_str::<T>(&braced) {
            return Some(v);
        }
    }
    None
}

/// Parse with [`parse_tolerant`], falling back to `default` on any failure.
pub fn parse_tolerant_or<T: DeserializeOwned>(text: &str, default: T) -> T {
    parse_tolerant(text).unwrap_or(default)
}

fn extract_fenced_json(text: &str) -> Option<String> {
    let start_marker = text.find("```json").map(|i| i + "```json".len());
    let start = start_marker.or_else(|| text.find("```").map(|i| i + 3))?;
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim().to_string())
}

fn extract_outermost_braces(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(text[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn parses_strict_json_directly() {
        let s: Sample = parse_tolerant(r#"{"a": 1, "b": "x"}"#).unwrap();
        assert_eq!(s, Sample { a: 1, b: "x".to_string() });
    }

    #[test]
    fn parses_json_wrapped_in_fenced_code_block() {
        let text = "Here you go:\n```json\n{\"a\": 2, \"b\": \"y\"}\n```\nHope that helps.";
        let s: Sample = parse_tolerant(text).unwrap();
        assert_eq!(s, Sample { a: 2, b: "y".to_string() });
    }

    #[test]
    fn parses_json_with_surrounding_prose_via_brace_scan() {
        let text = "Sure, the answer is {\"a\": 3, \"b\": \"z\"} as requested.";
        let s: Sample = parse_tolerant(text).unwrap();
        assert_eq!(s, Sample { a: 3, b: "z".to_string() });
    }

    #[test]
    fn falls_back_to_default_when_nothing_parses() {
        let s: Sample = parse_tolerant_or("not json at all", Sample { a: 0, b: "default".to_string() });
        assert_eq!(s, Sample { a: 0, b: "default".to_string() });
    }
}
