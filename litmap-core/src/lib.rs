//! # Litmap Core
//!
//! Core library for litmap, a research-landscape mapper.
//! Classifies literature clusters by trajectory and momentum, tags research
//! gaps with temporal viability, and drives the discovery backend through a
//! session store with cancellable, generation-guarded requests.

pub mod aggregate;
pub mod backend;
pub mod config;
pub mod error;
pub mod gaps;
pub mod normalize;
pub mod persistence;
pub mod pipeline;
pub mod rules;
pub mod state;
pub mod trajectory;
pub mod types;

// Re-export commonly used types at the crate root.
pub use aggregate::{ClusterSummary, summarize};
pub use backend::{BackendClient, StoreRequest};
pub use config::{LitmapConfig, load_config};
pub use error::{BackendError, ConfigError, LitmapError, Result, StateError};
pub use gaps::{classify_gap, classify_gaps};
pub use pipeline::{ClusterRun, Pipeline, StoreTask};
pub use rules::KeywordRule;
pub use state::{RequestTicket, ResearchState, ResearchStore, Stage};
pub use trajectory::{ClusterTransformer, classify_trajectory, momentum_score};
pub use types::{
    ClassifiedCluster, ClassifiedGap, Experiment, LifecycleStage, Paper, RawCluster, RawGap,
    RawPaper, Synthesis, TemporalViability, TrajectoryStatus, ViabilityConfidence,
};
