//! JSON extraction from free-form LM text

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

// Matches {...} blocks, tolerating one level of nesting
static JSON_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?:[^{}]|\{[^{}]*\})*\}").unwrap());

#[derive(Debug, Error)]
pub enum JsonExtractError {
    #[error("no JSON object found in the text")]
    NotFound,

    #[error("no candidate JSON object matched the expected structure: {0}")]
    NoMatch(#[source] serde_json::Error),
}

/// Find and parse the first `{...}` block in `text` that deserializes as `T`
///
/// Candidates that fail to parse are skipped silently; only when every
/// candidate fails is the last parse error surfaced.
pub fn extract_json_from_text<T: DeserializeOwned>(text: &str) -> Result<T, JsonExtractError> {
    debug!(text_len = text.len(), "extract_json_from_text: called");
    let mut last_err = None;
    for candidate in JSON_OBJECT_RE.find_iter(text) {
        match serde_json::from_str(candidate.as_str()) {
            Ok(value) => return Ok(value),
            Err(err) => last_err = Some(err),
        }
    }
    match last_err {
        Some(err) => Err(JsonExtractError::NoMatch(err)),
        None => Err(JsonExtractError::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        answer: String,
        confidence: f64,
    }

    #[test]
    fn test_extracts_embedded_object() {
        let text = r#"Sure! Here is my answer: {"answer": "yes", "confidence": 0.9} Hope that helps."#;
        let v: Verdict = extract_json_from_text(text).unwrap();
        assert_eq!(v.answer, "yes");
    }

    #[test]
    fn test_skips_non_matching_candidates() {
        let text = r#"{"noise": true} then {"answer": "no", "confidence": 0.2}"#;
        let v: Verdict = extract_json_from_text(text).unwrap();
        assert_eq!(v.answer, "no");
    }

    #[test]
    fn test_tolerates_one_level_of_nesting() {
        #[derive(Debug, Deserialize)]
        struct Outer {
            inner: Verdict,
        }
        let text = r#"Result: {"inner": {"answer": "yes", "confidence": 1.0}}"#;
        let outer: Outer = extract_json_from_text(text).unwrap();
        assert_eq!(outer.inner.answer, "yes");
    }

    #[test]
    fn test_no_braces_is_not_found() {
        let err = extract_json_from_text::<Verdict>("plain prose, no json here").unwrap_err();
        assert!(matches!(err, JsonExtractError::NotFound));
    }

    #[test]
    fn test_all_candidates_failing_is_no_match() {
        let err = extract_json_from_text::<Verdict>(r#"{"wrong": "shape"}"#).unwrap_err();
        assert!(matches!(err, JsonExtractError::NoMatch(_)));
    }
}
