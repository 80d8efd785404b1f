use criterion::{Criterion, black_box, criterion_group, criterion_main};
use litmap_core::aggregate::{summarize, timeline};
use litmap_core::gaps::{classify_gaps, classify_viability};
use litmap_core::normalize::parse_records;
use litmap_core::trajectory::ClusterTransformer;
use litmap_core::{RawCluster, RawGap, RawPaper};
use serde_json::json;

fn synthetic_clusters(count: usize, papers_per_cluster: usize) -> Vec<RawCluster> {
    (0..count)
        .map(|c| RawCluster {
            cluster_id: Some(json!(c.to_string())),
            name: None,
            paper_count: Some(papers_per_cluster as i64),
            papers: (0..papers_per_cluster)
                .map(|p| RawPaper {
                    title: Some(format!(
                        "Certified adversarial robustness via randomized smoothing, part {p}"
                    )),
                    abstract_text: Some(
                        "We benchmark transformer defenses on ImageNet and CIFAR-10.".into(),
                    ),
                    year: Some(2015 + ((c + p) % 10) as i64),
                    ..Default::default()
                })
                .collect(),
            key_papers: vec![],
        })
        .collect()
}

fn bench_cluster_transformer(c: &mut Criterion) {
    let transformer = ClusterTransformer::default();
    let small = synthetic_clusters(5, 10);
    let large = synthetic_clusters(50, 100);

    c.bench_function("transform_5_clusters", |b| {
        b.iter(|| transformer.transform_all(black_box(&small)))
    });

    c.bench_function("transform_50_clusters_100_papers", |b| {
        b.iter(|| transformer.transform_all(black_box(&large)))
    });
}

fn bench_gap_classifier(c: &mut Criterion) {
    c.bench_function("classify_viability_match", |b| {
        b.iter(|| classify_viability(black_box("Time-sensitive window before saturation")))
    });

    c.bench_function("classify_viability_fallback", |b| {
        b.iter(|| classify_viability(black_box("Declining interest since the benchmark closed")))
    });

    let gaps: Vec<RawGap> = (0..200)
        .map(|i| RawGap {
            gap: Some(format!("Gap {i}")),
            viability: Some(if i % 2 == 0 { "Future-viable" } else { "Declining" }.into()),
            reason: Some("Growing interest".into()),
            evidence: None,
        })
        .collect();
    c.bench_function("classify_200_gaps", |b| {
        b.iter(|| classify_gaps(black_box(&gaps)))
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let clusters = ClusterTransformer::default().transform_all(&synthetic_clusters(50, 100));

    c.bench_function("summarize_50_clusters", |b| {
        b.iter(|| summarize(black_box(&clusters)))
    });

    c.bench_function("timeline_50_clusters", |b| {
        b.iter(|| timeline(black_box(&clusters)))
    });
}

fn bench_payload_parsing(c: &mut Criterion) {
    let payload = serde_json::to_value(synthetic_clusters(20, 20)).unwrap_or_default();

    c.bench_function("parse_20_cluster_records", |b| {
        b.iter(|| parse_records::<RawCluster>(black_box(payload.clone())))
    });
}

criterion_group!(
    benches,
    bench_cluster_transformer,
    bench_gap_classifier,
    bench_aggregate,
    bench_payload_parsing,
);
criterion_main!(benches);
