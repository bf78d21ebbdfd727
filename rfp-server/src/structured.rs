//! Pulling structured answers out of free-form model text.
//!
//! Two steps: [`parse_structured`] finds the outermost JSON object or array
//! in the reply and deserializes it, [`or_default`] substitutes the stage's
//! fixed fallback when that fails. A parse failure is never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::warn;

use shared_types::StageKind;

// Greedy: first opening bracket through the last closing one.
static OBJECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("object pattern compiles"));
static ARRAY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("array pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

/// The slice of `text` that looks like JSON of the given shape.
pub fn extract_json(text: &str, shape: JsonShape) -> Option<&str> {
    let pattern = match shape {
        JsonShape::Object => &*OBJECT_PATTERN,
        JsonShape::Array => &*ARRAY_PATTERN,
    };
    pattern.find(text).map(|m| m.as_str())
}

pub fn parse_structured<T: DeserializeOwned>(text: &str, shape: JsonShape) -> Option<T> {
    let candidate = extract_json(text, shape)?;
    serde_json::from_str(candidate).ok()
}

/// Unwraps a parsed answer or falls back, logging the fallback.
pub fn or_default<T>(
    parsed: Option<T>,
    stage: StageKind,
    what: &str,
    fallback: impl FnOnce() -> T,
) -> T {
    match parsed {
        Some(value) => value,
        None => {
            warn!(stage = stage.as_str(), what, "unparseable model answer, using default");
            fallback()
        }
    }
}
