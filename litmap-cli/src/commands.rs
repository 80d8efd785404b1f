//! CLI subcommand handlers.

use crate::ClassifyAction;
use crate::Commands;
use crate::ConfigAction;
use litmap_core::aggregate::{self, ClusterSummary};
use litmap_core::normalize::parse_records;
use litmap_core::persistence;
use litmap_core::{
    ClassifiedCluster, ClassifiedGap, ClusterTransformer, Experiment, LitmapConfig, Pipeline,
    RawCluster, RawGap, ResearchStore, ViabilityConfidence, classify_gaps,
};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Options of the `run` subcommand.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub topic: String,
    pub experiments: bool,
    pub synthesis: bool,
    pub output: Option<PathBuf>,
    pub no_store: bool,
}

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Classify { action } => handle_classify(action, workspace, config_file),
        Commands::Run {
            topic,
            experiments,
            synthesis,
            output,
            no_store,
        } => {
            let opts = RunOptions {
                topic,
                experiments,
                synthesis,
                output,
                no_store,
            };
            handle_run(opts, workspace, config_file).await
        }
        Commands::Config { action } => handle_config(action, workspace, config_file),
    }
}

fn load(workspace: &Path, config_file: Option<&Path>) -> anyhow::Result<LitmapConfig> {
    let config = litmap_core::load_config(Some(workspace), config_file, None)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    for warning in config.validate() {
        warn!("{}", warning);
    }
    Ok(config)
}

fn handle_classify(
    action: ClassifyAction,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ClassifyAction::Clusters { file, json } => {
            let config = load(workspace, config_file)?;
            let clusters = classify_cluster_file(&file, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&clusters)?);
            } else {
                let summary = aggregate::summarize(&clusters);
                print!("{}", render_clusters(&clusters, &summary));
                print!("{}", render_timeline(&clusters));
            }
            Ok(())
        }
        ClassifyAction::Gaps { file, json } => {
            let gaps = classify_gap_file(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&gaps)?);
            } else {
                print!("{}", render_gaps(&gaps));
            }
            Ok(())
        }
    }
}

/// Classify a saved `/api/clusters` response.
pub fn classify_cluster_file(
    file: &Path,
    config: &LitmapConfig,
) -> anyhow::Result<Vec<ClassifiedCluster>> {
    let payload = persistence::load_payload(file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
    let raws: Vec<RawCluster> = parse_records(payload)?;
    Ok(ClusterTransformer::new(&config.classifier).transform_all(&raws))
}

/// Classify a saved `/api/gaps` response.
pub fn classify_gap_file(file: &Path) -> anyhow::Result<Vec<ClassifiedGap>> {
    let payload = persistence::load_payload(file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
    let raws: Vec<RawGap> = parse_records(payload)?;
    Ok(classify_gaps(&raws))
}

async fn handle_run(
    opts: RunOptions,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    let mut config = load(workspace, config_file)?;
    if opts.no_store {
        config.store.auto_store = false;
    }

    let store = ResearchStore::new();
    let pipeline = Pipeline::new(&config, store.clone())?;

    // The partial session is still saved after an interrupt.
    let interrupt = tokio::spawn(watch_interrupts(store.clone()));

    let result = run_pipeline(&pipeline, &opts).await;
    interrupt.abort();

    if let Some(path) = &opts.output {
        let state = store.snapshot().await;
        persistence::save_snapshot(path, &state)?;
        println!("Saved session to {}", path.display());
    }
    result
}

/// First Ctrl-C shuts the session down; a second one exits at once.
async fn watch_interrupts(store: ResearchStore) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("Interrupted, cancelling in-flight requests (Ctrl-C again to exit)");
    store.shutdown().await;

    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupted again, exiting");
        std::process::exit(130);
    }
}

fn ensure_running(store: &ResearchStore) -> anyhow::Result<()> {
    if store.is_shut_down() {
        anyhow::bail!("Interrupted");
    }
    Ok(())
}

async fn run_pipeline(pipeline: &Pipeline, opts: &RunOptions) -> anyhow::Result<()> {
    let store = pipeline.store();

    ensure_running(store)?;
    let papers = pipeline.discover(&opts.topic).await?;
    println!(
        "Discovered {} papers for \"{}\"\n",
        papers.len(),
        opts.topic.trim()
    );

    ensure_running(store)?;
    let run = pipeline.cluster().await?;
    print!("{}", render_clusters(&run.clusters, &run.summary));
    print!("{}", render_timeline(&run.clusters));

    ensure_running(store)?;
    let gaps = pipeline.find_gaps().await?;
    print!("{}", render_gaps(&gaps));

    if opts.experiments {
        ensure_running(store)?;
        let experiments = pipeline.propose_experiments().await?;
        print!("{}", render_experiments(&experiments));
    }

    if opts.synthesis {
        ensure_running(store)?;
        let synthesis = pipeline.synthesize().await?;
        println!(
            "Synthesis: {} sections{}\n",
            synthesis.section_count(),
            synthesis
                .warning
                .as_deref()
                .map(|w| format!(" (warning: {w})"))
                .unwrap_or_default()
        );
    }

    // The store task shares the session's shutdown token, so an interrupt
    // ends this wait too.
    if let Some(task) = run.store_task {
        if store.is_shut_down() {
            task.cancel();
        }
        match task.outcome().await {
            Ok(receipt) => println!(
                "Stored {} papers and {} clusters in the knowledge base",
                receipt.stored.papers, receipt.stored.clusters
            ),
            // Persistence is best-effort; the failure is already logged.
            Err(e) => eprintln!("Knowledge base store failed: {}", e),
        }
    }
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = litmap_core::config::workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&LitmapConfig::default())?;
            persistence::atomic_write(&config_path, toml_str.as_bytes())?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, config_file)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Cluster table followed by headline numbers.
pub fn render_clusters(clusters: &[ClassifiedCluster], summary: &ClusterSummary) -> String {
    if clusters.is_empty() {
        return "No clusters.\n\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:>4}  {:<28} {:>6}  {:<11} {:>8}  {:<12} {}\n",
        "ID", "NAME", "PAPERS", "STATUS", "MOMENTUM", "STAGE", "METHOD"
    ));
    for c in clusters {
        out.push_str(&format!(
            "{:>4}  {:<28} {:>6}  {:<11} {:>8}  {:<12} {}\n",
            c.id,
            aggregate::truncate_label(&c.name, 25),
            c.paper_count,
            c.trajectory_status.label(),
            c.momentum_score,
            c.lifecycle_stage.to_string(),
            c.dominant_method,
        ));
        out.push_str(&format!("      datasets: {}\n", c.datasets.join(", ")));
        for paper in &c.key_papers {
            out.push_str(&format!("      - {}\n", paper));
        }
    }
    out.push_str(&format!(
        "\n{} clusters, {} papers, avg momentum {}, {} rising, {} declining\n\n",
        summary.cluster_count,
        summary.total_papers,
        summary.avg_momentum,
        summary.rising_clusters.len(),
        summary.declining_clusters.len(),
    ));
    out
}

/// Papers per year as a text bar chart.
pub fn render_timeline(clusters: &[ClassifiedCluster]) -> String {
    let points = aggregate::timeline(clusters);
    let Some(max) = points.iter().map(|p| p.papers).max().filter(|m| *m > 0) else {
        return String::new();
    };

    let mut out = String::from("Publications per year\n");
    for point in &points {
        let width = (u128::from(point.papers) * 40).div_ceil(u128::from(max)) as usize;
        out.push_str(&format!(
            "  {}  {:>5}  {}\n",
            point.year,
            point.papers,
            "#".repeat(width)
        ));
    }
    out.push('\n');
    out
}

/// Gap list with viability and a marker for fallback classifications.
pub fn render_gaps(gaps: &[ClassifiedGap]) -> String {
    if gaps.is_empty() {
        return "No research gaps.\n\n".to_string();
    }

    let mut out = String::from("Research gaps\n");
    for gap in gaps {
        let marker = match gap.viability_confidence {
            ViabilityConfidence::Matched => "",
            ViabilityConfidence::Fallback => " (unclassified)",
        };
        out.push_str(&format!(
            "  {}. {} [{}{}]\n     {}\n",
            gap.id, gap.title, gap.temporal_viability, marker, gap.why
        ));
    }
    out.push('\n');
    out
}

pub fn render_experiments(experiments: &[Experiment]) -> String {
    if experiments.is_empty() {
        return "No experiments proposed.\n\n".to_string();
    }

    let mut out = String::from("Proposed experiments\n");
    for exp in experiments {
        let star = if exp.recommended { "*" } else { " " };
        out.push_str(&format!(
            " {}{}. {}\n     dataset: {}\n     models: {}\n     metrics: {}\n",
            star,
            exp.id,
            exp.objective,
            exp.dataset,
            exp.models.join(", "),
            exp.metrics.join(", "),
        ));
    }
    out.push('\n');
    out
}
