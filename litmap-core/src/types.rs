//! Core types for litmap.
//!
//! Raw records mirror what the discovery backend returns and are deliberately
//! lenient: every field is optional and tolerates the wrong JSON type, so a
//! malformed record degrades to defaults instead of failing the whole batch.
//! Classified records are produced fresh by the classifiers and never mutated.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A paper as returned by `/api/discover` or embedded in a cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPaper {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub paper_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub title: Option<String>,
    #[serde(
        rename = "abstract",
        default,
        deserialize_with = "lenient::opt_string"
    )]
    pub abstract_text: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub authors: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub year: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub url: Option<String>,
}

impl RawPaper {
    /// Publication year, treating zero as absent.
    pub fn known_year(&self) -> Option<i64> {
        self.year.filter(|y| *y != 0)
    }
}

/// A cluster record as returned by `/api/clusters`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCluster {
    /// String or number; resolved by the transformer.
    #[serde(default)]
    pub cluster_id: Option<Value>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub paper_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient::paper_list")]
    pub papers: Vec<RawPaper>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub key_papers: Vec<String>,
}

/// A research gap as returned by `/api/gaps`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGap {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub gap: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub viability: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub evidence: Option<String>,
}

/// An experiment proposal as returned by `/api/experiments`.
///
/// `datasets`, `models` and `metrics` arrive either as arrays or as scalars,
/// so they are kept as raw JSON and shaped by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExperiment {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub objective: Option<String>,
    #[serde(default)]
    pub datasets: Option<Value>,
    #[serde(default)]
    pub models: Option<Value>,
    #[serde(default)]
    pub metrics: Option<Value>,
}

/// Discrete lifecycle classification of a research cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrajectoryStatus {
    Rising,
    Stable,
    Saturating,
    Declining,
}

impl TrajectoryStatus {
    pub const ALL: [TrajectoryStatus; 4] = [
        TrajectoryStatus::Rising,
        TrajectoryStatus::Stable,
        TrajectoryStatus::Saturating,
        TrajectoryStatus::Declining,
    ];

    /// The lifecycle stage this status maps to. One-to-one.
    pub fn lifecycle_stage(self) -> LifecycleStage {
        match self {
            TrajectoryStatus::Rising => LifecycleStage::Acceleration,
            TrajectoryStatus::Saturating => LifecycleStage::Maturation,
            TrajectoryStatus::Declining => LifecycleStage::Decline,
            TrajectoryStatus::Stable => LifecycleStage::Growth,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            TrajectoryStatus::Rising => "Rising",
            TrajectoryStatus::Stable => "Stable",
            TrajectoryStatus::Saturating => "Saturating",
            TrajectoryStatus::Declining => "Declining",
        }
    }
}

impl fmt::Display for TrajectoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrajectoryStatus::Rising => "rising",
            TrajectoryStatus::Stable => "stable",
            TrajectoryStatus::Saturating => "saturating",
            TrajectoryStatus::Declining => "declining",
        };
        f.write_str(s)
    }
}

/// Lifecycle stage, a display projection of [`TrajectoryStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleStage {
    Acceleration,
    Maturation,
    Decline,
    Growth,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleStage::Acceleration => "Acceleration",
            LifecycleStage::Maturation => "Maturation",
            LifecycleStage::Decline => "Decline",
            LifecycleStage::Growth => "Growth",
        };
        f.write_str(s)
    }
}

/// A cluster after trajectory classification and momentum scoring.
///
/// Serialized in the display-record shape the backend's gap and store
/// endpoints read (`papers` is the count, `papersData` the member papers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedCluster {
    pub id: i64,
    pub name: String,
    #[serde(rename = "papers", alias = "paperCount")]
    pub paper_count: u64,
    pub dominant_method: String,
    pub datasets: Vec<String>,
    pub key_papers: Vec<String>,
    pub trajectory_status: TrajectoryStatus,
    pub momentum_score: u8,
    pub lifecycle_stage: LifecycleStage,
    /// Member papers, kept for timeline derivation and downstream requests.
    #[serde(default)]
    pub papers_data: Vec<RawPaper>,
}

/// How long a research gap is expected to remain relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemporalViability {
    FutureViable,
    TimeSensitive,
    LikelyObsolete,
}

impl fmt::Display for TemporalViability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TemporalViability::FutureViable => "future-viable",
            TemporalViability::TimeSensitive => "time-sensitive",
            TemporalViability::LikelyObsolete => "likely-obsolete",
        };
        f.write_str(s)
    }
}

/// Whether a viability came from a keyword hit or from the default fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViabilityConfidence {
    Matched,
    /// Nothing matched; the value is the fallback and should be treated as
    /// low-confidence.
    Fallback,
}

/// A research gap after temporal-viability classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedGap {
    pub id: String,
    pub title: String,
    pub why: String,
    pub evidence: String,
    pub temporal_viability: TemporalViability,
    pub temporal_justification: String,
    pub viability_confidence: ViabilityConfidence,
}

/// A normalized paper as held in the session store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub id: String,
    pub title: String,
    pub year: i64,
    pub venue: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,
}

impl Paper {
    /// The backend request shape used by `/api/clusters` and `/api/synthesis`.
    pub fn to_backend(&self) -> RawPaper {
        RawPaper {
            paper_id: Some(self.paper_id.clone().unwrap_or_else(|| self.id.clone())),
            title: Some(self.title.clone()),
            abstract_text: Some(self.abstract_text.clone()),
            authors: self.authors.clone(),
            year: Some(self.year),
            venue: Some(self.venue.clone()),
            url: self.url.clone(),
        }
    }
}

/// A normalized experiment proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: String,
    pub objective: String,
    pub dataset: String,
    pub models: Vec<String>,
    pub metrics: Vec<String>,
    pub outcome: String,
    pub recommended: bool,
    pub temporal_relevance: String,
    pub future_proof_design: String,
}

/// Synthesis document returned by `/api/synthesis`. The body is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub document: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Acknowledgement returned by `/api/paper/store`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreReceipt {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stored: StoredCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCounts {
    #[serde(default)]
    pub papers: u64,
    #[serde(default)]
    pub clusters: u64,
    #[serde(default)]
    pub synthesis_sections: u64,
    #[serde(default)]
    pub gaps: u64,
    #[serde(default)]
    pub experiments: u64,
}

/// Field deserializers that swallow type mismatches.
mod lenient {
    use super::RawPaper;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub(super) fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub(super) fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub(super) fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    pub(super) fn paper_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<RawPaper>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .map(|v| serde_json::from_value(v).unwrap_or_default())
                .collect(),
            _ => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle_stage_table() {
        assert_eq!(
            TrajectoryStatus::Rising.lifecycle_stage(),
            LifecycleStage::Acceleration
        );
        assert_eq!(
            TrajectoryStatus::Saturating.lifecycle_stage(),
            LifecycleStage::Maturation
        );
        assert_eq!(
            TrajectoryStatus::Declining.lifecycle_stage(),
            LifecycleStage::Decline
        );
        assert_eq!(
            TrajectoryStatus::Stable.lifecycle_stage(),
            LifecycleStage::Growth
        );
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&TrajectoryStatus::Saturating).unwrap();
        assert_eq!(json, "\"saturating\"");
        let back: TrajectoryStatus = serde_json::from_str("\"declining\"").unwrap();
        assert_eq!(back, TrajectoryStatus::Declining);
    }

    #[test]
    fn test_viability_serde_kebab_case() {
        let json = serde_json::to_string(&TemporalViability::FutureViable).unwrap();
        assert_eq!(json, "\"future-viable\"");
        assert_eq!(
            TemporalViability::LikelyObsolete.to_string(),
            "likely-obsolete"
        );
    }

    #[test]
    fn test_raw_paper_tolerates_wrong_types() {
        let paper: RawPaper = serde_json::from_value(json!({
            "title": 42,
            "year": "2021",
            "authors": ["A", 7, null],
            "abstract": null,
        }))
        .unwrap();
        assert_eq!(paper.title.as_deref(), Some("42"));
        assert_eq!(paper.year, Some(2021));
        assert_eq!(paper.authors, vec!["A".to_string(), "7".to_string()]);
        assert!(paper.abstract_text.is_none());
    }

    #[test]
    fn test_raw_paper_float_year_truncates() {
        let paper: RawPaper = serde_json::from_value(json!({"year": 2019.7})).unwrap();
        assert_eq!(paper.year, Some(2019));
    }

    #[test]
    fn test_raw_cluster_defaults() {
        let cluster: RawCluster = serde_json::from_value(json!({})).unwrap();
        assert!(cluster.cluster_id.is_none());
        assert!(cluster.papers.is_empty());
        assert!(cluster.key_papers.is_empty());
        assert_eq!(cluster.paper_count, None);
    }

    #[test]
    fn test_raw_cluster_bad_paper_entry_becomes_default() {
        let cluster: RawCluster = serde_json::from_value(json!({
            "papers": [{"title": "ok", "year": 2021}, "garbage"],
            "key_papers": "not a list",
        }))
        .unwrap();
        assert_eq!(cluster.papers.len(), 2);
        assert_eq!(cluster.papers[1], RawPaper::default());
        assert!(cluster.key_papers.is_empty());
    }

    #[test]
    fn test_known_year_ignores_zero() {
        let paper = RawPaper {
            year: Some(0),
            ..Default::default()
        };
        assert_eq!(paper.known_year(), None);
    }

    #[test]
    fn test_classified_cluster_wire_shape() {
        let cluster = ClassifiedCluster {
            id: 1,
            name: "Cluster 1".into(),
            paper_count: 4,
            dominant_method: "Various".into(),
            datasets: vec!["Various".into()],
            key_papers: vec![],
            trajectory_status: TrajectoryStatus::Stable,
            momentum_score: 28,
            lifecycle_stage: LifecycleStage::Growth,
            papers_data: vec![],
        };
        let value = serde_json::to_value(&cluster).unwrap();
        assert_eq!(value["papers"], 4);
        assert_eq!(value["trajectoryStatus"], "stable");
        assert_eq!(value["lifecycleStage"], "Growth");
        assert_eq!(value["momentumScore"], 28);
        assert!(value["papersData"].is_array());
    }

    #[test]
    fn test_paper_to_backend_prefers_paper_id() {
        let paper = Paper {
            id: "paper-0".into(),
            title: "T".into(),
            year: 2021,
            venue: "V".into(),
            abstract_text: "A".into(),
            authors: vec![],
            url: None,
            paper_id: Some("arxiv:1".into()),
        };
        assert_eq!(paper.to_backend().paper_id.as_deref(), Some("arxiv:1"));
    }
}
