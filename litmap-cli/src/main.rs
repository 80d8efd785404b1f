//! Litmap CLI: map a research area from the terminal.
//!
//! Classifies saved backend payloads offline, or runs the full
//! discover → cluster → gaps pipeline against a live backend.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Litmap: research trajectory and gap mapping
#[derive(Parser, Debug)]
#[command(name = "litmap", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Classify a saved backend payload without contacting the backend
    Classify {
        #[command(subcommand)]
        action: ClassifyAction,
    },
    /// Run the research pipeline for a topic
    Run {
        /// Research topic to discover papers for
        topic: String,

        /// Also propose experiments for the identified gaps
        #[arg(long)]
        experiments: bool,

        /// Also produce a synthesis document
        #[arg(long)]
        synthesis: bool,

        /// Save the session snapshot to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip posting results to the backend knowledge base
        #[arg(long)]
        no_store: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ClassifyAction {
    /// Classify a saved /api/clusters response
    Clusters {
        /// JSON file holding the backend response
        file: PathBuf,

        /// Print classified clusters as JSON
        #[arg(long)]
        json: bool,
    },
    /// Classify a saved /api/gaps response
    Gaps {
        /// JSON file holding the backend response
        file: PathBuf,

        /// Print classified gaps as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "litmap", "litmap")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "litmap.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    // Resolve workspace
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}
