//! Backend payload checks and record normalization.
//!
//! The backend answers with either a JSON array or an error object. These
//! helpers reject the error shapes before any classifier runs and turn raw
//! papers, experiments and synthesis documents into the session types.

use crate::error::BackendError;
use crate::types::{Experiment, Paper, RawExperiment, RawPaper, Synthesis};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

const DEFAULT_PAPER_TITLE: &str = "Untitled";
const DEFAULT_VENUE: &str = "Unknown";
const DEFAULT_OBJECTIVE: &str = "Unknown objective";
const PLACEHOLDER: &str = "TBD";
const EXPERIMENT_OUTCOME: &str = "To be determined based on experiment results";
const EXPERIMENT_RELEVANCE: &str = "Aligned with identified research gaps";
const EXPERIMENT_DESIGN: &str = "Designed to address temporal viability concerns";
/// Leading experiments flagged as recommended.
const RECOMMENDED_EXPERIMENTS: usize = 2;

/// Extract the `error` message of an error-shaped payload.
pub fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Accept an array payload and return its elements.
pub fn validate_array_payload(value: Value) -> Result<Vec<Value>, BackendError> {
    if let Some(message) = error_message(&value) {
        return Err(BackendError::Reported { message });
    }
    match value {
        Value::Array(items) => Ok(items),
        other => Err(BackendError::InvalidPayload {
            message: format!("expected array, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode each element leniently; elements that are not objects become defaults.
pub fn decode_records<T: DeserializeOwned + Default>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).unwrap_or_else(|e| {
                warn!(index, error = %e, "Malformed backend record, using defaults");
                T::default()
            })
        })
        .collect()
}

/// Validate an array payload and decode its records in one step.
pub fn parse_records<T: DeserializeOwned + Default>(value: Value) -> Result<Vec<T>, BackendError> {
    validate_array_payload(value).map(decode_records)
}

/// Normalize discovered papers. `current_year` fills missing years.
pub fn normalize_papers(raws: &[RawPaper], current_year: i64) -> Vec<Paper> {
    raws.iter()
        .enumerate()
        .map(|(index, raw)| {
            let paper_id = raw.paper_id.clone().filter(|s| !s.is_empty());
            Paper {
                id: paper_id
                    .clone()
                    .unwrap_or_else(|| format!("paper-{index}")),
                title: raw
                    .title
                    .clone()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_PAPER_TITLE.to_string()),
                year: raw.known_year().unwrap_or(current_year),
                venue: raw
                    .venue
                    .clone()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_VENUE.to_string()),
                abstract_text: raw.abstract_text.clone().unwrap_or_default(),
                authors: raw.authors.clone(),
                url: raw.url.clone(),
                paper_id,
            }
        })
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_items(items: &[Value]) -> Vec<String> {
    items.iter().filter_map(scalar_text).collect()
}

/// Arrays pass through, scalars are wrapped, anything else is `["TBD"]`.
fn list_or_placeholder(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => string_items(items),
        Some(other) => vec![scalar_text(other).unwrap_or_else(|| PLACEHOLDER.to_string())],
        None => vec![PLACEHOLDER.to_string()],
    }
}

/// Normalize experiment proposals; the first two are recommended.
pub fn normalize_experiments(raws: &[RawExperiment]) -> Vec<Experiment> {
    raws.iter()
        .enumerate()
        .map(|(index, raw)| {
            let dataset = match raw.datasets.as_ref() {
                Some(Value::Array(items)) => string_items(items).join(", "),
                Some(other) => scalar_text(other).unwrap_or_else(|| PLACEHOLDER.to_string()),
                None => PLACEHOLDER.to_string(),
            };
            Experiment {
                id: (index + 1).to_string(),
                objective: raw
                    .objective
                    .clone()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_OBJECTIVE.to_string()),
                dataset,
                models: list_or_placeholder(raw.models.as_ref()),
                metrics: list_or_placeholder(raw.metrics.as_ref()),
                outcome: EXPERIMENT_OUTCOME.to_string(),
                recommended: index < RECOMMENDED_EXPERIMENTS,
                temporal_relevance: EXPERIMENT_RELEVANCE.to_string(),
                future_proof_design: EXPERIMENT_DESIGN.to_string(),
            }
        })
        .collect()
}

impl Synthesis {
    /// Accept a synthesis document, rejecting error-shaped payloads.
    pub fn from_value(value: Value) -> Result<Self, BackendError> {
        if let Some(message) = error_message(&value) {
            return Err(BackendError::Reported { message });
        }
        if !value.is_object() {
            return Err(BackendError::InvalidPayload {
                message: format!("expected object, got {}", json_kind(&value)),
            });
        }
        let warning = value
            .get("warning")
            .and_then(Value::as_str)
            .filter(|w| !w.is_empty())
            .map(String::from);
        Ok(Self {
            document: value,
            warning,
        })
    }

    /// Number of sections in the document, if it has a `sections` object.
    pub fn section_count(&self) -> usize {
        self.document
            .get("sections")
            .and_then(Value::as_object)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}
