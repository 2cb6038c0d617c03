use once_cell::sync::Lazy;
use regex::Regex;

static THINK_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<think>[\s\S]*?</think>|<think\s*/>").unwrap());

static REASONING_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<reasoning>[\s\S]*?</reasoning>").unwrap());

/// Remove reasoning blocks some chat models emit ahead of their answer.
///
/// Reasoning text often quotes draft statements ("maybe SELECT ... ;"), which
/// would otherwise win the fallback SQL scan.
pub fn clean_llm_response(response: &str) -> String {
    let cleaned = THINK_TAG_PATTERN.replace_all(response, "");
    let cleaned = REASONING_TAG_PATTERN.replace_all(&cleaned, "");
    cleaned.trim().to_string()
}
