//! Temporal-viability classification of research gaps.
//!
//! The backend describes each gap's viability in free text. This module maps
//! that text onto three fixed categories with an ordered containment table.
//! Text that matches nothing falls back to `likely-obsolete`, and the result
//! is tagged [`ViabilityConfidence::Fallback`] so callers can tell a real
//! match from elimination.

use crate::types::{ClassifiedGap, RawGap, TemporalViability, ViabilityConfidence};
use serde::Serialize;
use tracing::debug;

/// Ordered viability rules; first containment hit wins.
pub const VIABILITY_RULES: &[(&str, TemporalViability)] = &[
    ("future", TemporalViability::FutureViable),
    ("time", TemporalViability::TimeSensitive),
];

/// Category used when no rule matches.
pub const FALLBACK_VIABILITY: TemporalViability = TemporalViability::LikelyObsolete;

const DEFAULT_TITLE: &str = "Unknown gap";
const DEFAULT_WHY: &str = "Analysis needed";
const DEFAULT_EVIDENCE: &str = "Identified from cluster analysis";
const DEFAULT_JUSTIFICATION: &str = "Based on trajectory analysis";

/// Classify a viability string, case-insensitively.
pub fn classify_viability(viability: &str) -> (TemporalViability, ViabilityConfidence) {
    let lowered = viability.to_lowercase();
    VIABILITY_RULES
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, v)| (*v, ViabilityConfidence::Matched))
        .unwrap_or((FALLBACK_VIABILITY, ViabilityConfidence::Fallback))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Classify one raw gap at position `index`.
pub fn classify_gap(raw: &RawGap, index: usize) -> ClassifiedGap {
    let viability_text = raw.viability.as_deref().unwrap_or("");
    let (temporal_viability, confidence) = classify_viability(viability_text);
    if confidence == ViabilityConfidence::Fallback {
        debug!(
            index,
            viability = viability_text,
            "No viability keyword matched; defaulting to likely-obsolete"
        );
    }

    ClassifiedGap {
        id: (index + 1).to_string(),
        title: non_empty(&raw.gap).unwrap_or(DEFAULT_TITLE).to_string(),
        why: non_empty(&raw.reason).unwrap_or(DEFAULT_WHY).to_string(),
        evidence: non_empty(&raw.evidence)
            .unwrap_or(DEFAULT_EVIDENCE)
            .to_string(),
        temporal_viability,
        temporal_justification: non_empty(&raw.reason)
            .unwrap_or(DEFAULT_JUSTIFICATION)
            .to_string(),
        viability_confidence: confidence,
    }
}

/// Classify a whole backend response, preserving order.
pub fn classify_gaps(raws: &[RawGap]) -> Vec<ClassifiedGap> {
    raws.iter()
        .enumerate()
        .map(|(i, g)| classify_gap(g, i))
        .collect()
}

/// Request shape of `/api/experiments`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapRequest {
    pub gap: String,
    pub viability: String,
    pub reason: String,
}

/// Convert classified gaps into the experiments request body.
pub fn to_backend_request(gaps: &[ClassifiedGap]) -> Vec<GapRequest> {
    gaps.iter()
        .map(|g| GapRequest {
            gap: g.title.clone(),
            viability: g.temporal_viability.to_string(),
            reason: g.why.clone(),
        })
        .collect()
}
