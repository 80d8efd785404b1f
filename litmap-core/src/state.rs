//! Session state store.
//!
//! Holds the papers, clusters, synthesis, gaps and experiments of one
//! research session behind typed setters. Collections are only ever replaced
//! wholesale, and replacing a stage discards everything derived from it.
//!
//! Concurrent requests are handled with tickets: [`ResearchStore::begin`]
//! cancels whatever request is in flight for that stage and hands out a new
//! generation-stamped [`RequestTicket`]. A commit is accepted only for the
//! newest ticket, so a late response from a superseded request can never
//! overwrite fresher results. [`ResearchStore::begin_with`] reads a stage's
//! input under the same lock that issues the ticket, so any later change to
//! that input invalidates the ticket.

use crate::error::StateError;
use crate::types::{ClassifiedCluster, ClassifiedGap, Experiment, Paper, Synthesis};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// A pipeline stage whose result lives in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Papers,
    Clusters,
    Synthesis,
    Gaps,
    Experiments,
}

impl Stage {
    /// Stages whose results are derived from this one.
    pub fn downstream(self) -> &'static [Stage] {
        match self {
            Stage::Papers => &[
                Stage::Clusters,
                Stage::Synthesis,
                Stage::Gaps,
                Stage::Experiments,
            ],
            Stage::Clusters => &[Stage::Gaps, Stage::Experiments],
            Stage::Gaps => &[Stage::Experiments],
            Stage::Synthesis | Stage::Experiments => &[],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Papers => "papers",
            Stage::Clusters => "clusters",
            Stage::Synthesis => "synthesis",
            Stage::Gaps => "gaps",
            Stage::Experiments => "experiments",
        };
        f.write_str(s)
    }
}

/// Per-stage loading indicators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingFlags {
    pub papers: bool,
    pub clusters: bool,
    pub synthesis: bool,
    pub gaps: bool,
    pub experiments: bool,
}

impl LoadingFlags {
    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::Papers => self.papers,
            Stage::Clusters => self.clusters,
            Stage::Synthesis => self.synthesis,
            Stage::Gaps => self.gaps,
            Stage::Experiments => self.experiments,
        }
    }

    pub fn set(&mut self, stage: Stage, loading: bool) {
        let flag = match stage {
            Stage::Papers => &mut self.papers,
            Stage::Clusters => &mut self.clusters,
            Stage::Synthesis => &mut self.synthesis,
            Stage::Gaps => &mut self.gaps,
            Stage::Experiments => &mut self.experiments,
        };
        *flag = loading;
    }

    pub fn any(&self) -> bool {
        self.papers || self.clusters || self.synthesis || self.gaps || self.experiments
    }
}

/// Immutable snapshot of a research session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    pub session_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub papers: Vec<Paper>,
    pub clusters: Vec<ClassifiedCluster>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<Synthesis>,
    pub gaps: Vec<ClassifiedGap>,
    pub experiments: Vec<Experiment>,
    pub loading: LoadingFlags,
    pub updated_at: DateTime<Utc>,
}

impl ResearchState {
    fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            topic: None,
            papers: Vec::new(),
            clusters: Vec::new(),
            synthesis: None,
            gaps: Vec::new(),
            experiments: Vec::new(),
            loading: LoadingFlags::default(),
            updated_at: Utc::now(),
        }
    }

    fn clear(&mut self, stage: Stage) {
        match stage {
            Stage::Papers => self.papers = Vec::new(),
            Stage::Clusters => self.clusters = Vec::new(),
            Stage::Synthesis => self.synthesis = None,
            Stage::Gaps => self.gaps = Vec::new(),
            Stage::Experiments => self.experiments = Vec::new(),
        }
    }
}

/// Handle for one in-flight request of a stage.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    stage: Stage,
    generation: u64,
    token: CancellationToken,
}

impl RequestTicket {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Token cancelled when the request is superseded.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

struct Inner {
    state: ResearchState,
    generations: HashMap<Stage, u64>,
    in_flight: HashMap<Stage, CancellationToken>,
}

impl Inner {
    fn current(&self, stage: Stage) -> u64 {
        self.generations.get(&stage).copied().unwrap_or(0)
    }

    fn check(&self, ticket: &RequestTicket) -> Result<(), StateError> {
        let current = self.current(ticket.stage);
        if ticket.generation != current || ticket.token.is_cancelled() {
            return Err(StateError::Stale {
                stage: ticket.stage,
                generation: ticket.generation,
                current,
            });
        }
        Ok(())
    }

    /// Cancel any request in flight for `stage` and move to a new generation.
    fn invalidate(&mut self, stage: Stage) -> u64 {
        if let Some(token) = self.in_flight.remove(&stage) {
            token.cancel();
        }
        let next = self.current(stage) + 1;
        self.generations.insert(stage, next);
        self.state.loading.set(stage, false);
        next
    }

    /// Replace one stage's data, discarding and invalidating everything downstream.
    fn replace(&mut self, stage: Stage, apply: impl FnOnce(&mut ResearchState)) {
        apply(&mut self.state);
        for &downstream in stage.downstream() {
            self.invalidate(downstream);
            self.state.clear(downstream);
        }
        self.state.updated_at = Utc::now();
    }

    fn settle(&mut self, stage: Stage) {
        self.in_flight.remove(&stage);
        self.state.loading.set(stage, false);
    }
}

/// Shared handle to the session state. Cloning shares the same session.
#[derive(Clone)]
pub struct ResearchStore {
    inner: Arc<Mutex<Inner>>,
    /// Parent of every ticket token; cancelled once on shutdown.
    shutdown: CancellationToken,
}

impl Default for ResearchStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResearchStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResearchStore").finish_non_exhaustive()
    }
}

impl ResearchStore {
    /// Create an empty session.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: ResearchState::new(),
                generations: HashMap::new(),
                in_flight: HashMap::new(),
            })),
            shutdown: CancellationToken::new(),
        }
    }

    /// Clone the current state.
    pub async fn snapshot(&self) -> ResearchState {
        self.inner.lock().await.state.clone()
    }

    pub async fn papers(&self) -> Vec<Paper> {
        self.inner.lock().await.state.papers.clone()
    }

    pub async fn clusters(&self) -> Vec<ClassifiedCluster> {
        self.inner.lock().await.state.clusters.clone()
    }

    pub async fn gaps(&self) -> Vec<ClassifiedGap> {
        self.inner.lock().await.state.gaps.clone()
    }

    pub async fn experiments(&self) -> Vec<Experiment> {
        self.inner.lock().await.state.experiments.clone()
    }

    pub async fn synthesis(&self) -> Option<Synthesis> {
        self.inner.lock().await.state.synthesis.clone()
    }

    pub async fn loading(&self) -> LoadingFlags {
        self.inner.lock().await.state.loading
    }

    /// Start a request for `stage`, cancelling the one in flight.
    pub async fn begin(&self, stage: Stage) -> RequestTicket {
        self.begin_with(stage, |_| ()).await.0
    }

    /// Start a request for `stage` and read its input from the same state.
    ///
    /// Replacing that input afterwards invalidates the returned ticket, so a
    /// result derived from it can never be committed over newer upstream data.
    pub async fn begin_with<T>(
        &self,
        stage: Stage,
        read: impl FnOnce(&ResearchState) -> T,
    ) -> (RequestTicket, T) {
        let mut inner = self.inner.lock().await;
        let input = read(&inner.state);
        let generation = inner.invalidate(stage);
        let token = self.shutdown.child_token();
        inner.in_flight.insert(stage, token.clone());
        inner.state.loading.set(stage, true);
        debug!(%stage, generation, "Began request");
        let ticket = RequestTicket {
            stage,
            generation,
            token,
        };
        (ticket, input)
    }

    /// Whether `ticket` is still the newest request for its stage.
    pub async fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.inner.lock().await.check(ticket).is_ok()
    }

    /// Mark a request as finished without a result.
    ///
    /// Ignored for superseded tickets, whose successor owns the loading flag.
    pub async fn fail(&self, ticket: &RequestTicket) {
        let mut inner = self.inner.lock().await;
        if ticket.generation == inner.current(ticket.stage) {
            inner.settle(ticket.stage);
        }
    }

    /// Cancel every request, current and future, including background stores.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.cancel_all().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token for work outside the ticket system, cancelled on shutdown.
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Cancel every request in flight.
    pub async fn cancel_all(&self) {
        let mut inner = self.inner.lock().await;
        let stages: Vec<Stage> = inner.in_flight.keys().copied().collect();
        for stage in stages {
            inner.invalidate(stage);
        }
    }

    async fn commit(
        &self,
        ticket: &RequestTicket,
        apply: impl FnOnce(&mut ResearchState),
    ) -> Result<(), StateError> {
        let mut inner = self.inner.lock().await;
        inner.check(ticket)?;
        inner.replace(ticket.stage, apply);
        inner.settle(ticket.stage);
        debug!(stage = %ticket.stage, generation = ticket.generation, "Committed result");
        Ok(())
    }

    /// Commit discovered papers for `topic`.
    pub async fn commit_papers(
        &self,
        ticket: &RequestTicket,
        topic: impl Into<String>,
        papers: Vec<Paper>,
    ) -> Result<(), StateError> {
        let topic = topic.into();
        self.commit(ticket, |s| {
            s.topic = Some(topic);
            s.papers = papers;
        })
        .await
    }

    pub async fn commit_clusters(
        &self,
        ticket: &RequestTicket,
        clusters: Vec<ClassifiedCluster>,
    ) -> Result<(), StateError> {
        self.commit(ticket, |s| s.clusters = clusters).await
    }

    pub async fn commit_synthesis(
        &self,
        ticket: &RequestTicket,
        synthesis: Synthesis,
    ) -> Result<(), StateError> {
        self.commit(ticket, |s| s.synthesis = Some(synthesis)).await
    }

    pub async fn commit_gaps(
        &self,
        ticket: &RequestTicket,
        gaps: Vec<ClassifiedGap>,
    ) -> Result<(), StateError> {
        self.commit(ticket, |s| s.gaps = gaps).await
    }

    pub async fn commit_experiments(
        &self,
        ticket: &RequestTicket,
        experiments: Vec<Experiment>,
    ) -> Result<(), StateError> {
        self.commit(ticket, |s| s.experiments = experiments).await
    }

    async fn set(&self, stage: Stage, apply: impl FnOnce(&mut ResearchState)) {
        let mut inner = self.inner.lock().await;
        // A direct write supersedes whatever request is in flight.
        inner.invalidate(stage);
        inner.replace(stage, apply);
    }

    /// Replace papers directly, discarding all derived results.
    pub async fn set_papers(&self, papers: Vec<Paper>) {
        self.set(Stage::Papers, |s| s.papers = papers).await;
    }

    pub async fn set_clusters(&self, clusters: Vec<ClassifiedCluster>) {
        self.set(Stage::Clusters, |s| s.clusters = clusters).await;
    }

    pub async fn set_synthesis(&self, synthesis: Option<Synthesis>) {
        self.set(Stage::Synthesis, |s| s.synthesis = synthesis).await;
    }

    pub async fn set_gaps(&self, gaps: Vec<ClassifiedGap>) {
        self.set(Stage::Gaps, |s| s.gaps = gaps).await;
    }

    pub async fn set_experiments(&self, experiments: Vec<Experiment>) {
        self.set(Stage::Experiments, |s| s.experiments = experiments)
            .await;
    }
}
