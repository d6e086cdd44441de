//! Recovery of structured JSON from untrusted model output.
//!
//! The external CLI is asked to return bare JSON but routinely wraps its
//! answer in a result envelope, a markdown fence, or leading prose. The
//! chain below tries the most specific signal first and degrades to a
//! brute-force brace scan before giving up.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

// ===================================================================
// Error: the single terminal failure of the chain
// ===================================================================

/// Every recovery step failed. Carries the working text so the operator
/// can see exactly what the external process said.
#[derive(Debug)]
pub struct RecoverError {
    pub raw: String,
}

impl fmt::Display for RecoverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to parse model response as JSON.\nRaw output:\n{}",
            self.raw
        )
    }
}

impl std::error::Error for RecoverError {}

// ===================================================================
// Fallback chain
// ===================================================================

/// Outcome of one link in the chain.
enum Step {
    /// Produced a decoded value; the chain short-circuits.
    Decoded(Value),
    /// Rewrote the working text for later links.
    Rewritten(String),
    /// Nothing to act on; the next link sees the text unchanged.
    Pass,
}

/// Run the full fallback chain over a raw reply.
///
/// Order matters: envelope unwrap and fence extraction only narrow the
/// working text, then a direct decode is attempted, then the outermost
/// `{...}` span as a last resort.
pub fn recover(raw: &str) -> Result<Value, RecoverError> {
    let chain: [fn(&str) -> Step; 4] =
        [unwrap_envelope, extract_fence, decode_direct, rescue_braces];

    let mut working = raw.trim().to_string();
    for step in chain {
        match step(&working) {
            Step::Decoded(value) => return Ok(value),
            Step::Rewritten(next) => working = next,
            Step::Pass => {}
        }
    }
    Err(RecoverError { raw: working })
}

/// Step 1: the CLI's JSON output mode wraps the answer as
/// `{"result": "<text>", ...}`. If the whole text decodes to an object with
/// a string `result` field, continue with that field's content.
fn unwrap_envelope(text: &str) -> Step {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Step::Pass;
    };
    match value.get("result").and_then(Value::as_str) {
        Some(inner) => Step::Rewritten(inner.trim().to_string()),
        None => Step::Pass,
    }
}

// Case-insensitive on the language tag, dot matches newlines, non-greedy
// interior so trailing prose after the closing fence is not swallowed.
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:json)?\s*\n?(.*?)\n?\s*```").expect("fence pattern")
});

/// Step 2: pull the interior out of a ```json fenced block, tolerating
/// prose before and after the fence.
fn extract_fence(text: &str) -> Step {
    match FENCE.captures(text) {
        Some(caps) => Step::Rewritten(caps[1].trim().to_string()),
        None => Step::Pass,
    }
}

/// Step 3: the working text is (now) plain JSON.
fn decode_direct(text: &str) -> Step {
    match serde_json::from_str(text) {
        Ok(value) => Step::Decoded(value),
        Err(_) => Step::Pass,
    }
}

/// Step 4, last resort: decode the outermost `{...}` span. Outermost
/// rather than first-closing so a nested object inside the reply does not
/// win over the reply itself.
fn rescue_braces(text: &str) -> Step {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Step::Pass;
    };
    if end < start {
        return Step::Pass;
    }
    match serde_json::from_str(&text[start..=end]) {
        Ok(value) => Step::Decoded(value),
        Err(_) => Step::Pass,
    }
}

#[cfg(test)]
mod tests;
