//! Structured Result Extractor — pulls a typed JSON result out of the
//! generation service's free-text response.
//!
//! Upstream output is non-deterministic: the JSON object may be wrapped in
//! prose, markdown code fences, or both. Extraction takes the greedy span
//! from the first `{` through the last `}` and decodes it. Any failure to
//! locate, decode, or shape the object is `ExtractError::MalformedResponse`;
//! this module never panics on malformed input.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Malformed response from the generation service: {0}")]
    MalformedResponse(String),
}

/// Typed result of an advisory generation. `advice` keeps whatever nested
/// shape the model produced; the renderer deals with it later.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AdvisoryOutcome {
    pub diagnosis: String,
    pub advice: serde_json::Value,
}

/// Typed result of an image diagnosis. Confidence is optional and taken
/// verbatim — values outside [0,100] are not clamped.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DiagnosisOutcome {
    pub diagnosis: String,
    pub advice: String,
    pub confidence: Option<i32>,
}

/// Greedy match: first `{` through last `}`, across newlines.
fn json_span(raw: &str) -> Option<&str> {
    static SPAN: OnceLock<Regex> = OnceLock::new();
    let re = SPAN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid literal regex"));
    re.find(raw).map(|m| m.as_str())
}

/// Decode the embedded JSON object, or fail with `MalformedResponse`.
pub fn extract_value(raw: &str) -> Result<serde_json::Value, ExtractError> {
    let span = json_span(raw)
        .ok_or_else(|| ExtractError::MalformedResponse("no JSON object found".to_string()))?;
    serde_json::from_str(span).map_err(|e| ExtractError::MalformedResponse(e.to_string()))
}

pub fn extract_advisory(raw: &str) -> Result<AdvisoryOutcome, ExtractError> {
    let value = extract_value(raw)?;
    serde_json::from_value(value).map_err(|e| ExtractError::MalformedResponse(e.to_string()))
}

pub fn extract_diagnosis(raw: &str) -> Result<DiagnosisOutcome, ExtractError> {
    let value = extract_value(raw)?;
    serde_json::from_value(value).map_err(|e| ExtractError::MalformedResponse(e.to_string()))
}
