//! Research pipeline: discovery, clustering, gaps, experiments and synthesis.
//!
//! Each stage reads its input from the [`ResearchStore`] together with a
//! fresh [`RequestTicket`](crate::state::RequestTicket), calls the backend,
//! classifies the response and commits it. Starting a stage again cancels the previous
//! run of that stage; a superseded run fails with [`StateError::Stale`] or
//! [`BackendError::Cancelled`] instead of overwriting newer results.

use crate::aggregate::{self, ClusterSummary};
use crate::backend::{BackendClient, StoreRequest};
use crate::config::{ClassifierConfig, LitmapConfig};
use crate::error::{BackendError, LitmapError, Result, StateError};
use crate::gaps::{classify_gaps, to_backend_request};
use crate::normalize::{normalize_experiments, normalize_papers};
use crate::state::{ResearchStore, Stage};
use crate::trajectory::ClusterTransformer;
use crate::types::{ClassifiedCluster, ClassifiedGap, Experiment, Paper, StoreReceipt, Synthesis};
use chrono::Datelike;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Background post of session results to the backend store.
///
/// Dropping the task detaches it; the outcome is still logged. The request is
/// abandoned when `cancel` is triggered or [`StoreTask::cancel`] is called.
#[derive(Debug)]
pub struct StoreTask {
    handle: JoinHandle<std::result::Result<StoreReceipt, BackendError>>,
    cancel: CancellationToken,
}

impl StoreTask {
    /// Spawn the store request on the current runtime.
    pub fn spawn(
        client: BackendClient,
        request: StoreRequest,
        cancel: CancellationToken,
    ) -> Self {
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            match client.store(&request, &token).await {
                Ok(receipt) => {
                    info!(
                        status = receipt.status.as_str(),
                        papers = receipt.stored.papers,
                        clusters = receipt.stored.clusters,
                        "Stored session results"
                    );
                    Ok(receipt)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to store session results");
                    Err(e)
                }
            }
        });
        Self { handle, cancel }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abandon the request.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the store request to finish.
    pub async fn outcome(self) -> std::result::Result<StoreReceipt, BackendError> {
        self.handle.await.map_err(|e| BackendError::TaskFailed {
            message: e.to_string(),
        })?
    }
}

/// Result of a clustering pass.
#[derive(Debug)]
pub struct ClusterRun {
    pub clusters: Vec<ClassifiedCluster>,
    pub summary: ClusterSummary,
    /// Present when auto-store is enabled.
    pub store_task: Option<StoreTask>,
}

/// Drives the backend stages against a shared session store.
#[derive(Debug, Clone)]
pub struct Pipeline {
    client: BackendClient,
    store: ResearchStore,
    transformer: ClusterTransformer,
    auto_store: bool,
}

fn missing(message: &str) -> LitmapError {
    StateError::MissingPrerequisite {
        message: message.to_string(),
    }
    .into()
}

impl Pipeline {
    /// Build a pipeline from configuration.
    pub fn new(config: &LitmapConfig, store: ResearchStore) -> Result<Self> {
        let client = BackendClient::new(&config.backend, &config.discovery)?;
        Ok(Self::with_client(
            client,
            store,
            &config.classifier,
            config.store.auto_store,
        ))
    }

    pub fn with_client(
        client: BackendClient,
        store: ResearchStore,
        classifier: &ClassifierConfig,
        auto_store: bool,
    ) -> Self {
        Self {
            client,
            store,
            transformer: ClusterTransformer::new(classifier),
            auto_store,
        }
    }

    pub fn store(&self) -> &ResearchStore {
        &self.store
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub fn transformer(&self) -> &ClusterTransformer {
        &self.transformer
    }

    /// Search for papers on `topic` and replace the session's papers.
    pub async fn discover(&self, topic: &str) -> Result<Vec<Paper>> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(missing("a research topic is required"));
        }

        let ticket = self.store.begin(Stage::Papers).await;
        let raws = match self.client.discover(topic, ticket.token()).await {
            Ok(raws) => raws,
            Err(e) => {
                self.store.fail(&ticket).await;
                return Err(e.into());
            }
        };

        let current_year = i64::from(chrono::Utc::now().year());
        let papers = normalize_papers(&raws, current_year);
        self.store
            .commit_papers(&ticket, topic, papers.clone())
            .await?;
        info!(topic, papers = papers.len(), "Discovery complete");
        Ok(papers)
    }

    /// Cluster the session's papers and classify each cluster.
    pub async fn cluster(&self) -> Result<ClusterRun> {
        let (ticket, papers) = self
            .store
            .begin_with(Stage::Clusters, |s| s.papers.clone())
            .await;
        if papers.is_empty() {
            self.store.fail(&ticket).await;
            return Err(missing("no papers to cluster; run discovery first"));
        }
        let request: Vec<_> = papers.iter().map(Paper::to_backend).collect();

        let raws = match self.client.clusters(&request, ticket.token()).await {
            Ok(raws) => raws,
            Err(e) => {
                self.store.fail(&ticket).await;
                return Err(e.into());
            }
        };

        let clusters = self.transformer.transform_all(&raws);
        self.store
            .commit_clusters(&ticket, clusters.clone())
            .await?;

        let summary = aggregate::summarize(&clusters);
        info!(
            clusters = summary.cluster_count,
            papers = summary.total_papers,
            rising = summary.rising_clusters.len(),
            avg_momentum = summary.avg_momentum,
            "Clustering complete"
        );

        let store_task = self.auto_store.then(|| {
            StoreTask::spawn(
                self.client.clone(),
                StoreRequest {
                    papers,
                    clusters: clusters.clone(),
                    ..Default::default()
                },
                self.store.child_token(),
            )
        });

        Ok(ClusterRun {
            clusters,
            summary,
            store_task,
        })
    }

    /// Ask the backend for research gaps across the session's clusters.
    pub async fn find_gaps(&self) -> Result<Vec<ClassifiedGap>> {
        let (ticket, clusters) = self
            .store
            .begin_with(Stage::Gaps, |s| s.clusters.clone())
            .await;
        if clusters.is_empty() {
            self.store.fail(&ticket).await;
            return Err(missing("no clusters to analyze; run clustering first"));
        }

        let raws = match self.client.gaps(&clusters, ticket.token()).await {
            Ok(raws) => raws,
            Err(e) => {
                self.store.fail(&ticket).await;
                return Err(e.into());
            }
        };

        let gaps = classify_gaps(&raws);
        self.store.commit_gaps(&ticket, gaps.clone()).await?;
        info!(gaps = gaps.len(), "Gap analysis complete");
        Ok(gaps)
    }

    /// Ask the backend for experiments addressing the session's gaps.
    pub async fn propose_experiments(&self) -> Result<Vec<Experiment>> {
        let (ticket, request) = self
            .store
            .begin_with(Stage::Experiments, |s| to_backend_request(&s.gaps))
            .await;
        if request.is_empty() {
            self.store.fail(&ticket).await;
            return Err(missing("no gaps to address; run gap analysis first"));
        }

        let raws = match self.client.experiments(&request, ticket.token()).await {
            Ok(raws) => raws,
            Err(e) => {
                self.store.fail(&ticket).await;
                return Err(e.into());
            }
        };

        let experiments = normalize_experiments(&raws);
        self.store
            .commit_experiments(&ticket, experiments.clone())
            .await?;
        info!(experiments = experiments.len(), "Experiment design complete");
        Ok(experiments)
    }

    /// Produce a synthesis document for the session's papers.
    pub async fn synthesize(&self) -> Result<Synthesis> {
        let (ticket, request) = self
            .store
            .begin_with(Stage::Synthesis, |s| {
                s.papers.iter().map(Paper::to_backend).collect::<Vec<_>>()
            })
            .await;
        if request.is_empty() {
            self.store.fail(&ticket).await;
            return Err(missing("no papers to synthesize; run discovery first"));
        }

        let synthesis = match self.client.synthesis(&request, ticket.token()).await {
            Ok(s) => s,
            Err(e) => {
                self.store.fail(&ticket).await;
                return Err(e.into());
            }
        };

        self.store
            .commit_synthesis(&ticket, synthesis.clone())
            .await?;
        info!(sections = synthesis.section_count(), "Synthesis complete");
        Ok(synthesis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> Pipeline {
        Pipeline::new(&LitmapConfig::default(), ResearchStore::new()).unwrap()
    }

    fn is_missing(err: &LitmapError) -> bool {
        matches!(
            err,
            LitmapError::State(StateError::MissingPrerequisite { .. })
        )
    }

    #[tokio::test]
    async fn test_discover_requires_topic() {
        let err = pipeline().discover("   ").await.unwrap_err();
        assert!(is_missing(&err));
    }

    #[tokio::test]
    async fn test_stages_require_inputs() {
        let p = pipeline();
        assert!(is_missing(&p.cluster().await.unwrap_err()));
        assert!(is_missing(&p.find_gaps().await.unwrap_err()));
        assert!(is_missing(&p.propose_experiments().await.unwrap_err()));
        assert!(is_missing(&p.synthesize().await.unwrap_err()));
    }

    #[tokio::test]
    async fn test_missing_input_leaves_loading_clear() {
        let p = pipeline();
        let _ = p.cluster().await;
        assert!(!p.store().loading().await.any());
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let mut config = LitmapConfig::default();
        config.backend.base_url = "nope".into();
        let err = Pipeline::new(&config, ResearchStore::new()).unwrap_err();
        assert!(matches!(
            err,
            LitmapError::Backend(BackendError::InvalidUrl { .. })
        ));
    }
}
