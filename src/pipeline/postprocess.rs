//! Cleanup of model-generated markdown.
//!
//! The prompt already forbids fenced output, but models occasionally wrap the
//! whole report in ``` / ```markdown fences anyway. Stripping is idempotent:
//! unfenced input passes through unchanged.

use once_cell::sync::Lazy;
use regex::Regex;

static OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown)?\n(.*)\n```$").unwrap());

/// Strip one outer markdown code fence if present, otherwise pass through.
pub fn strip_markdown_fences(input: &str) -> String {
    match OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}
