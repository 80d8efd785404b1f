//! Cluster trajectory classification and momentum scoring.
//!
//! Turns a raw backend cluster into a [`ClassifiedCluster`]: trajectory
//! status from average publication year and volume, a bounded momentum
//! score, the lifecycle stage, a dominant method, dataset tags and up to
//! three key papers. Every step is total; missing data degrades to defaults.

use crate::config::ClassifierConfig;
use crate::rules::{self, KeywordRule, FALLBACK_LABEL};
use crate::types::{ClassifiedCluster, RawCluster, RawPaper, TrajectoryStatus};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Year assumed for a paper without one, and for an empty cluster.
pub const DEFAULT_YEAR: f64 = 2020.0;
/// Average year above which a cluster is rising.
pub const RISING_AFTER_YEAR: f64 = 2022.0;
/// Average year below which a cluster is declining.
pub const DECLINING_BEFORE_YEAR: f64 = 2020.0;
/// Paper count above which a non-rising cluster is saturating.
pub const SATURATING_ABOVE_PAPERS: i64 = 20;
/// Baseline year for the momentum score.
pub const MOMENTUM_BASE_YEAR: f64 = 2018.0;
/// Maximum number of key papers shown per cluster.
pub const MAX_KEY_PAPERS: usize = 3;
/// Key paper titles longer than this are truncated.
pub const KEY_PAPER_TITLE_CHARS: usize = 60;

/// Mean publication year of the member papers.
pub fn average_year(papers: &[RawPaper]) -> f64 {
    if papers.is_empty() {
        return DEFAULT_YEAR;
    }
    let sum: f64 = papers
        .iter()
        .map(|p| p.known_year().map(|y| y as f64).unwrap_or(DEFAULT_YEAR))
        .sum();
    sum / papers.len() as f64
}

/// Classify a cluster. First matching rule wins: recency, then volume,
/// then staleness.
pub fn classify_trajectory(avg_year: f64, paper_count: i64) -> TrajectoryStatus {
    if avg_year > RISING_AFTER_YEAR {
        TrajectoryStatus::Rising
    } else if paper_count > SATURATING_ABOVE_PAPERS {
        TrajectoryStatus::Saturating
    } else if avg_year < DECLINING_BEFORE_YEAR {
        TrajectoryStatus::Declining
    } else {
        TrajectoryStatus::Stable
    }
}

/// Momentum in `[0, 100]`: ten points per year past 2018 plus two per paper.
pub fn momentum_score(avg_year: f64, paper_count: i64) -> u8 {
    let raw = (avg_year - MOMENTUM_BASE_YEAR) * 10.0 + paper_count as f64 * 2.0;
    if raw.is_nan() {
        return 0;
    }
    round_half_up(raw).clamp(0.0, 100.0) as u8
}

/// Rounds `.5` toward positive infinity.
pub(crate) fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// The backend id's leading integer, if it has a nonzero one.
pub fn backend_cluster_id(cluster_id: Option<&Value>) -> Option<i64> {
    let parsed = match cluster_id {
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Some(Value::String(s)) => parse_leading_int(s),
        _ => None,
    };
    parsed.filter(|id| *id != 0)
}

/// Resolve the display id of a single cluster: the backend id, or the
/// 1-based position when that is missing, unparseable or zero.
pub fn resolve_cluster_id(cluster_id: Option<&Value>, index: usize) -> i64 {
    backend_cluster_id(cluster_id).unwrap_or(index as i64 + 1)
}

/// Assign a distinct id to every cluster in a response.
///
/// Backend ids are claimed first, in order. A cluster without a usable id,
/// or repeating one already claimed, takes its 1-based position, moved up to
/// the next id not yet taken.
pub fn assign_cluster_ids(raws: &[RawCluster]) -> Vec<i64> {
    let mut taken = HashSet::with_capacity(raws.len());
    let mut claimed = Vec::with_capacity(raws.len());
    for raw in raws {
        let id = backend_cluster_id(raw.cluster_id.as_ref());
        claimed.push(id.filter(|id| taken.insert(*id)));
    }

    claimed
        .into_iter()
        .enumerate()
        .map(|(index, id)| {
            id.unwrap_or_else(|| {
                let mut candidate = index as i64 + 1;
                while !taken.insert(candidate) {
                    candidate = candidate.saturating_add(1);
                }
                candidate
            })
        })
        .collect()
}

/// Parse an optionally signed run of digits at the start of `s`.
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok().map(|n| n * sign)
}

fn cluster_id_label(cluster_id: Option<&Value>) -> Option<String> {
    match cluster_id {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Format one key paper: title cut to 60 characters with `...`, then the year.
pub fn format_key_paper(paper: &RawPaper) -> String {
    let title = paper
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or("Untitled");
    let year = paper
        .known_year()
        .map(|y| format!(" ({y})"))
        .unwrap_or_default();
    if title.chars().count() > KEY_PAPER_TITLE_CHARS {
        let cut: String = title.chars().take(KEY_PAPER_TITLE_CHARS).collect();
        format!("{cut}...{year}")
    } else {
        format!("{title}{year}")
    }
}

/// Up to three key papers: the backend's list when present, else the newest members.
pub fn key_papers(cluster: &RawCluster) -> Vec<String> {
    if !cluster.key_papers.is_empty() {
        return cluster
            .key_papers
            .iter()
            .take(MAX_KEY_PAPERS)
            .cloned()
            .collect();
    }
    let mut newest: Vec<&RawPaper> = cluster.papers.iter().collect();
    // Stable sort keeps backend order among equal years.
    newest.sort_by_key(|p| std::cmp::Reverse(p.known_year().unwrap_or(0)));
    newest
        .into_iter()
        .take(MAX_KEY_PAPERS)
        .map(format_key_paper)
        .collect()
}

/// Lowercase abstract + title of every member, joined for keyword scans.
pub fn corpus_text(papers: &[RawPaper]) -> String {
    papers
        .iter()
        .map(|p| {
            format!(
                "{} {}",
                p.abstract_text.as_deref().unwrap_or(""),
                p.title.as_deref().unwrap_or("")
            )
            .to_lowercase()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Converts raw backend clusters into classified clusters.
#[derive(Debug, Clone)]
pub struct ClusterTransformer {
    method_rules: Vec<KeywordRule>,
    dataset_rules: Vec<KeywordRule>,
}

impl Default for ClusterTransformer {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl ClusterTransformer {
    /// Build a transformer from the configured rule tables.
    pub fn new(config: &ClassifierConfig) -> Self {
        let normalize = |rules: &[KeywordRule]| -> Vec<KeywordRule> {
            rules
                .iter()
                .map(|r| KeywordRule::new(r.keyword.as_str(), r.label.as_str()))
                .collect()
        };
        Self {
            method_rules: normalize(&config.method_rules),
            dataset_rules: normalize(&config.dataset_rules),
        }
    }

    /// Dominant method label for the cluster text.
    pub fn dominant_method(&self, corpus: &str) -> String {
        rules::first_match(&self.method_rules, corpus)
            .unwrap_or(FALLBACK_LABEL)
            .to_string()
    }

    /// Dataset labels for the cluster text; never empty.
    pub fn datasets(&self, corpus: &str) -> Vec<String> {
        let labels = rules::all_matches(&self.dataset_rules, corpus);
        if labels.is_empty() {
            vec![FALLBACK_LABEL.to_string()]
        } else {
            labels
        }
    }

    /// Classify one cluster at position `index` in the backend response.
    pub fn transform(&self, raw: &RawCluster, index: usize) -> ClassifiedCluster {
        self.classify(raw, resolve_cluster_id(raw.cluster_id.as_ref(), index))
    }

    /// Classify a whole backend response, preserving order, with distinct ids.
    pub fn transform_all(&self, raws: &[RawCluster]) -> Vec<ClassifiedCluster> {
        raws.iter()
            .zip(assign_cluster_ids(raws))
            .map(|(raw, id)| self.classify(raw, id))
            .collect()
    }

    fn classify(&self, raw: &RawCluster, id: i64) -> ClassifiedCluster {
        let avg_year = average_year(&raw.papers);
        let paper_count = raw.paper_count.unwrap_or(0);
        let status = classify_trajectory(avg_year, paper_count);
        let corpus = corpus_text(&raw.papers);

        let name = raw
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| {
                let label =
                    cluster_id_label(raw.cluster_id.as_ref()).unwrap_or_else(|| id.to_string());
                format!("Cluster {label}")
            });

        let display_count = if paper_count > 0 {
            paper_count as u64
        } else {
            raw.papers.len() as u64
        };

        let classified = ClassifiedCluster {
            id,
            name,
            paper_count: display_count,
            dominant_method: self.dominant_method(&corpus),
            datasets: self.datasets(&corpus),
            key_papers: key_papers(raw),
            trajectory_status: status,
            momentum_score: momentum_score(avg_year, paper_count),
            lifecycle_stage: status.lifecycle_stage(),
            papers_data: raw.papers.clone(),
        };

        debug!(
            id = classified.id,
            avg_year,
            status = %classified.trajectory_status,
            momentum = classified.momentum_score,
            "Classified cluster"
        );
        classified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LifecycleStage;
    use serde_json::json;

    fn paper(title: &str, year: Option<i64>, abstract_text: &str) -> RawPaper {
        RawPaper {
            title: Some(title.to_string()),
            year,
            abstract_text: Some(abstract_text.to_string()),
            ..Default::default()
        }
    }

    fn cluster(papers: Vec<RawPaper>, paper_count: Option<i64>) -> RawCluster {
        RawCluster {
            cluster_id: Some(json!("1")),
            name: Some("Robustness".into()),
            paper_count,
            papers,
            key_papers: vec![],
        }
    }

    #[test]
    fn test_average_year_defaults() {
        assert_eq!(average_year(&[]), 2020.0);
        let papers = vec![paper("a", Some(2024), ""), paper("b", None, "")];
        assert_eq!(average_year(&papers), 2022.0);
    }

    #[test]
    fn test_trajectory_precedence() {
        assert_eq!(classify_trajectory(2023.0, 50), TrajectoryStatus::Rising);
        assert_eq!(
            classify_trajectory(2022.0, 21),
            TrajectoryStatus::Saturating
        );
        assert_eq!(
            classify_trajectory(2015.0, 21),
            TrajectoryStatus::Saturating
        );
        assert_eq!(classify_trajectory(2019.9, 20), TrajectoryStatus::Declining);
        assert_eq!(classify_trajectory(2020.0, 20), TrajectoryStatus::Stable);
        assert_eq!(classify_trajectory(2022.0, 0), TrajectoryStatus::Stable);
    }

    #[test]
    fn test_momentum_clamps() {
        assert_eq!(momentum_score(1990.0, 0), 0);
        assert_eq!(momentum_score(2030.0, 1000), 100);
        assert_eq!(momentum_score(2021.0, 5), 40);
        assert_eq!(momentum_score(2018.25, 0), 3);
        assert_eq!(momentum_score(f64::NAN, 0), 0);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(2.49), 2.0);
        assert_eq!(round_half_up(-2.5), -2.0);
    }

    #[test]
    fn test_resolve_cluster_id() {
        assert_eq!(resolve_cluster_id(Some(&json!("7")), 0), 7);
        assert_eq!(resolve_cluster_id(Some(&json!(4)), 0), 4);
        assert_eq!(resolve_cluster_id(Some(&json!(3.9)), 0), 3);
        assert_eq!(resolve_cluster_id(Some(&json!("12abc")), 0), 12);
        assert_eq!(resolve_cluster_id(Some(&json!("-2")), 0), -2);
        assert_eq!(resolve_cluster_id(Some(&json!("abc")), 4), 5);
        assert_eq!(resolve_cluster_id(Some(&json!(0)), 2), 3);
        assert_eq!(resolve_cluster_id(Some(&json!(null)), 0), 1);
        assert_eq!(resolve_cluster_id(None, 9), 10);
    }

    #[test]
    fn test_assign_cluster_ids_skips_backend_ids() {
        let with_id = |id: Value| RawCluster {
            cluster_id: Some(id),
            ..Default::default()
        };
        let raws = [with_id(json!("2")), RawCluster::default()];
        assert_eq!(assign_cluster_ids(&raws), vec![2, 3]);

        let raws = [
            RawCluster::default(),
            with_id(json!(1)),
            RawCluster::default(),
        ];
        assert_eq!(assign_cluster_ids(&raws), vec![2, 1, 3]);
    }

    #[test]
    fn test_assign_cluster_ids_repeated_backend_id() {
        let raws = [
            RawCluster {
                cluster_id: Some(json!(5)),
                ..Default::default()
            },
            RawCluster {
                cluster_id: Some(json!("5")),
                ..Default::default()
            },
        ];
        assert_eq!(assign_cluster_ids(&raws), vec![5, 2]);
    }

    #[test]
    fn test_format_key_paper_truncates_by_chars() {
        let long = "é".repeat(70);
        let formatted = format_key_paper(&paper(&long, Some(2021), ""));
        assert_eq!(formatted, format!("{}... (2021)", "é".repeat(60)));

        let short = format_key_paper(&paper("Short title", None, ""));
        assert_eq!(short, "Short title");

        let exact = "x".repeat(60);
        assert_eq!(format_key_paper(&paper(&exact, None, "")), exact);
    }

    #[test]
    fn test_format_key_paper_untitled() {
        let p = RawPaper {
            year: Some(2019),
            ..Default::default()
        };
        assert_eq!(format_key_paper(&p), "Untitled (2019)");
    }

    #[test]
    fn test_key_papers_newest_first_stable() {
        let raw = cluster(
            vec![
                paper("old", Some(2015), ""),
                paper("new-a", Some(2023), ""),
                paper("undated", None, ""),
                paper("new-b", Some(2023), ""),
                paper("mid", Some(2020), ""),
            ],
            Some(5),
        );
        assert_eq!(
            key_papers(&raw),
            vec!["new-a (2023)", "new-b (2023)", "mid (2020)"]
        );
    }

    #[test]
    fn test_key_papers_prefers_backend_list() {
        let mut raw = cluster(vec![paper("p", Some(2020), "")], Some(1));
        raw.key_papers = vec!["From backend".into(); 5];
        assert_eq!(key_papers(&raw), vec!["From backend".to_string(); 3]);
    }

    #[test]
    fn test_transform_full_record() {
        let transformer = ClusterTransformer::default();
        let raw = cluster(
            vec![
                paper("Adversarial robustness", Some(2023), "We evaluate on ImageNet."),
                paper("Certified smoothing", Some(2024), "CIFAR benchmark results."),
            ],
            Some(2),
        );
        let out = transformer.transform(&raw, 0);
        assert_eq!(out.id, 1);
        assert_eq!(out.name, "Robustness");
        assert_eq!(out.paper_count, 2);
        assert_eq!(out.trajectory_status, TrajectoryStatus::Rising);
        assert_eq!(out.lifecycle_stage, LifecycleStage::Acceleration);
        assert_eq!(out.dominant_method, "Adversarial Training");
        assert_eq!(out.datasets, vec!["ImageNet", "CIFAR", "Benchmarks"]);
        // (2023.5 - 2018) * 10 + 2 * 2 = 59
        assert_eq!(out.momentum_score, 59);
        assert_eq!(out.key_papers[0], "Certified smoothing (2024)");
    }

    #[test]
    fn test_transform_empty_record() {
        let transformer = ClusterTransformer::default();
        let out = transformer.transform(&RawCluster::default(), 3);
        assert_eq!(out.id, 4);
        assert_eq!(out.name, "Cluster 4");
        assert_eq!(out.paper_count, 0);
        assert_eq!(out.dominant_method, "Various");
        assert_eq!(out.datasets, vec!["Various"]);
        assert!(out.key_papers.is_empty());
        assert_eq!(out.trajectory_status, TrajectoryStatus::Stable);
        assert_eq!(out.momentum_score, 20);
    }

    #[test]
    fn test_transform_name_uses_backend_id() {
        let transformer = ClusterTransformer::default();
        let raw = RawCluster {
            cluster_id: Some(json!("c-9")),
            ..Default::default()
        };
        let out = transformer.transform(&raw, 0);
        assert_eq!(out.name, "Cluster c-9");
        assert_eq!(out.id, 1);
    }

    #[test]
    fn test_paper_count_falls_back_to_members() {
        let transformer = ClusterTransformer::default();
        let raw = cluster(
            vec![paper("a", Some(2021), ""), paper("b", Some(2021), "")],
            None,
        );
        let out = transformer.transform(&raw, 0);
        assert_eq!(out.paper_count, 2);
        // Momentum and status use the raw count, which is missing.
        assert_eq!(out.momentum_score, 30);
    }

    #[test]
    fn test_volume_beats_staleness() {
        let transformer = ClusterTransformer::default();
        let raw = cluster(vec![paper("a", Some(2010), "")], Some(40));
        assert_eq!(
            transformer.transform(&raw, 0).trajectory_status,
            TrajectoryStatus::Saturating
        );
    }

    #[test]
    fn test_custom_rules_are_lowercased() {
        let config = ClassifierConfig {
            method_rules: vec![KeywordRule {
                keyword: "Graph".into(),
                label: "Graph Learning".into(),
            }],
            ..Default::default()
        };
        let transformer = ClusterTransformer::new(&config);
        assert_eq!(
            transformer.dominant_method("message passing on graph data"),
            "Graph Learning"
        );
    }

    #[test]
    fn test_transform_all_positions() {
        let transformer = ClusterTransformer::default();
        let out = transformer.transform_all(&[RawCluster::default(), RawCluster::default()]);
        assert_eq!(out.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_transform_all_names_follow_assigned_id() {
        let transformer = ClusterTransformer::default();
        let raws = [
            RawCluster {
                cluster_id: Some(json!("2")),
                ..Default::default()
            },
            RawCluster::default(),
        ];
        let out = transformer.transform_all(&raws);
        assert_eq!(out[0].id, 2);
        assert_eq!(out[1].id, 3);
        assert_eq!(out[1].name, "Cluster 3");
    }

    #[test]
    fn test_transform_huge_paper_count() {
        let transformer = ClusterTransformer::default();
        let raw = cluster(vec![paper("a", Some(2021), "")], Some(i64::MAX));
        let out = transformer.transform(&raw, 0);
        assert_eq!(out.paper_count, i64::MAX as u64);
        assert_eq!(out.momentum_score, 100);
        assert_eq!(out.trajectory_status, TrajectoryStatus::Saturating);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let transformer = ClusterTransformer::default();
        let raw = cluster(vec![paper("quantum circuits", Some(2019), "")], Some(3));
        let a = serde_json::to_vec(&transformer.transform(&raw, 0)).unwrap();
        let b = serde_json::to_vec(&transformer.transform(&raw, 0)).unwrap();
        assert_eq!(a, b);
    }
}
