//! Summary statistics and presentation mappings over classified clusters.
//!
//! Everything here is a pure function of the cluster slice and is recomputed
//! on each call.

use crate::trajectory::round_half_up;
use crate::types::{ClassifiedCluster, TrajectoryStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// Headline numbers for a set of clusters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub cluster_count: usize,
    pub total_papers: u64,
    /// Ids of rising clusters, in input order.
    pub rising_clusters: Vec<i64>,
    /// Ids of declining clusters, in input order.
    pub declining_clusters: Vec<i64>,
    pub avg_momentum: u8,
}

/// Sum of paper counts, saturating at `u64::MAX`.
pub fn total_papers(clusters: &[ClassifiedCluster]) -> u64 {
    clusters
        .iter()
        .fold(0u64, |total, c| total.saturating_add(c.paper_count))
}

/// Clusters with the given status, in input order.
pub fn with_status(
    clusters: &[ClassifiedCluster],
    status: TrajectoryStatus,
) -> Vec<&ClassifiedCluster> {
    clusters
        .iter()
        .filter(|c| c.trajectory_status == status)
        .collect()
}

pub fn rising_clusters(clusters: &[ClassifiedCluster]) -> Vec<&ClassifiedCluster> {
    with_status(clusters, TrajectoryStatus::Rising)
}

pub fn declining_clusters(clusters: &[ClassifiedCluster]) -> Vec<&ClassifiedCluster> {
    with_status(clusters, TrajectoryStatus::Declining)
}

/// Rounded mean momentum; 0 for no clusters.
pub fn avg_momentum(clusters: &[ClassifiedCluster]) -> u8 {
    if clusters.is_empty() {
        return 0;
    }
    let sum: u64 = clusters.iter().map(|c| u64::from(c.momentum_score)).sum();
    round_half_up(sum as f64 / clusters.len() as f64) as u8
}

/// Compute every headline number at once.
pub fn summarize(clusters: &[ClassifiedCluster]) -> ClusterSummary {
    ClusterSummary {
        cluster_count: clusters.len(),
        total_papers: total_papers(clusters),
        rising_clusters: rising_clusters(clusters).iter().map(|c| c.id).collect(),
        declining_clusters: declining_clusters(clusters).iter().map(|c| c.id).collect(),
        avg_momentum: avg_momentum(clusters),
    }
}

const RISING_SHADES: [&str; 4] = ["#10b981", "#34d399", "#6ee7b7", "#a7f3d0"];
const STABLE_SHADES: [&str; 4] = ["#3b82f6", "#60a5fa", "#93c5fd", "#bfdbfe"];
const SATURATING_SHADES: [&str; 4] = ["#f59e0b", "#fbbf24", "#fcd34d", "#fde68a"];
const DECLINING_SHADES: [&str; 4] = ["#ef4444", "#f87171", "#fca5a5", "#fecaca"];

/// Chart color for the cluster at `index`: one of four shades per status.
pub fn cluster_color(status: TrajectoryStatus, index: usize) -> &'static str {
    let shades = match status {
        TrajectoryStatus::Rising => &RISING_SHADES,
        TrajectoryStatus::Stable => &STABLE_SHADES,
        TrajectoryStatus::Saturating => &SATURATING_SHADES,
        TrajectoryStatus::Declining => &DECLINING_SHADES,
    };
    shades[index % shades.len()]
}

/// Two-stop gradient for a status card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gradient {
    pub from: &'static str,
    pub to: &'static str,
}

pub fn cluster_gradient(status: TrajectoryStatus) -> Gradient {
    let shades = match status {
        TrajectoryStatus::Rising => &RISING_SHADES,
        TrajectoryStatus::Stable => &STABLE_SHADES,
        TrajectoryStatus::Saturating => &SATURATING_SHADES,
        TrajectoryStatus::Declining => &DECLINING_SHADES,
    };
    Gradient {
        from: shades[0],
        to: shades[1],
    }
}

/// Cut `name` to `max` characters, appending `...` when shortened.
pub fn truncate_label(name: &str, max: usize) -> String {
    if name.chars().count() > max {
        let cut: String = name.chars().take(max).collect();
        format!("{cut}...")
    } else {
        name.to_string()
    }
}

/// One bar of the paper-distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionEntry {
    pub theme: String,
    pub count: u64,
    pub color: &'static str,
    pub status: TrajectoryStatus,
}

pub fn distribution(clusters: &[ClassifiedCluster]) -> Vec<DistributionEntry> {
    clusters
        .iter()
        .enumerate()
        .map(|(i, c)| DistributionEntry {
            theme: truncate_label(&c.name, 25),
            count: c.paper_count,
            color: cluster_color(c.trajectory_status, i),
            status: c.trajectory_status,
        })
        .collect()
}

/// One bar of the momentum chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumEntry {
    pub name: String,
    pub momentum: u8,
    pub status: TrajectoryStatus,
    pub color: &'static str,
}

pub fn momentum_series(clusters: &[ClassifiedCluster]) -> Vec<MomentumEntry> {
    clusters
        .iter()
        .enumerate()
        .map(|(i, c)| MomentumEntry {
            name: truncate_label(&c.name, 15),
            momentum: c.momentum_score,
            status: c.trajectory_status,
            color: cluster_color(c.trajectory_status, i),
        })
        .collect()
}

/// Paper counts for one publication year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelinePoint {
    pub year: i64,
    pub papers: u64,
    pub by_status: BTreeMap<TrajectoryStatus, u64>,
}

/// Year a cluster without dated papers is attributed to.
fn estimated_year(momentum: u8) -> i64 {
    if momentum > 70 {
        2022
    } else if momentum > 40 {
        2020
    } else {
        2018
    }
}

/// Papers per year across all clusters, oldest first.
///
/// Dated member papers count individually; undated members are skipped. A
/// cluster without member papers contributes its whole paper count to a year
/// estimated from momentum. Counts saturate at `u64::MAX`.
pub fn timeline(clusters: &[ClassifiedCluster]) -> Vec<TimelinePoint> {
    let mut points: BTreeMap<i64, TimelinePoint> = BTreeMap::new();
    let mut add = |year: i64, status: TrajectoryStatus, n: u64| {
        let point = points.entry(year).or_insert_with(|| TimelinePoint {
            year,
            papers: 0,
            by_status: BTreeMap::new(),
        });
        point.papers = point.papers.saturating_add(n);
        let by_status = point.by_status.entry(status).or_insert(0);
        *by_status = by_status.saturating_add(n);
    };

    for cluster in clusters {
        let years: Vec<i64> = cluster
            .papers_data
            .iter()
            .filter_map(|p| p.known_year())
            .collect();
        if cluster.papers_data.is_empty() {
            add(
                estimated_year(cluster.momentum_score),
                cluster.trajectory_status,
                cluster.paper_count,
            );
        } else {
            for year in years {
                add(year, cluster.trajectory_status, 1);
            }
        }
    }

    points.into_values().collect()
}
