//! HTTP client for the literature-discovery backend.
//!
//! Every call posts JSON to one endpoint and races the response against a
//! [`CancellationToken`]. Timeouts come from the reqwest client, so a stuck
//! clustering or synthesis run surfaces as [`BackendError::Timeout`] rather
//! than hanging the session.

use crate::config::{BackendConfig, DiscoveryConfig};
use crate::error::BackendError;
use crate::gaps::GapRequest;
use crate::normalize::{error_message, parse_records};
use crate::types::{
    ClassifiedCluster, ClassifiedGap, Experiment, Paper, RawCluster, RawExperiment, RawGap,
    RawPaper, StoreReceipt, Synthesis,
};
use chrono::Datelike;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

pub const DISCOVER_ENDPOINT: &str = "/api/discover/";
pub const CLUSTERS_ENDPOINT: &str = "/api/clusters/";
pub const SYNTHESIS_ENDPOINT: &str = "/api/synthesis/";
pub const GAPS_ENDPOINT: &str = "/api/gaps/";
pub const EXPERIMENTS_ENDPOINT: &str = "/api/experiments/";
pub const STORE_ENDPOINT: &str = "/api/paper/store";

/// Body of a `/api/discover/` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoverRequest {
    pub query: String,
    pub start_year: i64,
    pub end_year: i64,
    pub max_results: u32,
}

/// Body of a `/api/paper/store` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreRequest {
    pub papers: Vec<Paper>,
    pub clusters: Vec<ClassifiedCluster>,
    pub synthesis: Option<Value>,
    pub gaps: Vec<ClassifiedGap>,
    pub experiments: Vec<Experiment>,
}

/// Client for the backend API.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: Url,
    timeout_secs: u64,
    discovery: DiscoveryConfig,
}

impl BackendClient {
    /// Create a client from configuration.
    pub fn new(config: &BackendConfig, discovery: &DiscoveryConfig) -> Result<Self, BackendError> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| BackendError::InvalidUrl {
            url: config.base_url.clone(),
            message: e.to_string(),
        })?;
        // Endpoint paths are joined relative to the base, which needs a trailing slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| BackendError::Request {
                endpoint: base_url.to_string(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            timeout_secs: config.timeout_secs,
            discovery: discovery.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| BackendError::InvalidUrl {
                url: format!("{}{}", self.base_url, endpoint),
                message: e.to_string(),
            })
    }

    fn map_transport_error(&self, endpoint: &str, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_secs: self.timeout_secs,
            }
        } else {
            BackendError::Request {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }
        }
    }

    /// POST `body` to `endpoint` and return the decoded JSON response.
    async fn post_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<Value, BackendError> {
        let url = self.endpoint_url(endpoint)?;
        debug!(url = url.as_str(), "Sending backend request");

        let cancelled = || BackendError::Cancelled {
            endpoint: endpoint.to_string(),
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            result = self.client.post(url).json(body).send() => {
                result.map_err(|e| self.map_transport_error(endpoint, e))?
            }
        };

        let status = response.status();
        let body_text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            result = response.text() => result.map_err(|e| self.map_transport_error(endpoint, e))?,
        };

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body_text)
                .ok()
                .and_then(|v| error_message(&v))
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            return Err(BackendError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body_text).map_err(|e| BackendError::InvalidPayload {
            message: format!("Invalid JSON from {}: {}", endpoint, e),
        })
    }

    /// Build the discovery request for `query`.
    pub fn discover_request(&self, query: &str) -> DiscoverRequest {
        DiscoverRequest {
            query: query.trim().to_string(),
            start_year: self.discovery.start_year,
            end_year: self
                .discovery
                .end_year
                .unwrap_or_else(|| i64::from(chrono::Utc::now().year())),
            max_results: self.discovery.max_results,
        }
    }

    /// Search for papers on a topic.
    pub async fn discover(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawPaper>, BackendError> {
        let request = self.discover_request(query);
        let value = self.post_json(DISCOVER_ENDPOINT, &request, cancel).await?;
        parse_records(value)
    }

    /// Cluster the given papers.
    pub async fn clusters(
        &self,
        papers: &[RawPaper],
        cancel: &CancellationToken,
    ) -> Result<Vec<RawCluster>, BackendError> {
        let value = self.post_json(CLUSTERS_ENDPOINT, papers, cancel).await?;
        parse_records(value)
    }

    /// Produce a synthesis document for the given papers.
    pub async fn synthesis(
        &self,
        papers: &[RawPaper],
        cancel: &CancellationToken,
    ) -> Result<Synthesis, BackendError> {
        let value = self.post_json(SYNTHESIS_ENDPOINT, papers, cancel).await?;
        let synthesis = Synthesis::from_value(value)?;
        if let Some(warning) = &synthesis.warning {
            warn!(warning = warning.as_str(), "Synthesis returned with a warning");
        }
        Ok(synthesis)
    }

    /// Find research gaps across classified clusters.
    pub async fn gaps(
        &self,
        clusters: &[ClassifiedCluster],
        cancel: &CancellationToken,
    ) -> Result<Vec<RawGap>, BackendError> {
        let value = self.post_json(GAPS_ENDPOINT, clusters, cancel).await?;
        parse_records(value)
    }

    /// Propose experiments for classified gaps.
    pub async fn experiments(
        &self,
        gaps: &[GapRequest],
        cancel: &CancellationToken,
    ) -> Result<Vec<RawExperiment>, BackendError> {
        let value = self.post_json(EXPERIMENTS_ENDPOINT, gaps, cancel).await?;
        parse_records(value)
    }

    /// Persist session results in the backend knowledge base.
    pub async fn store(
        &self,
        request: &StoreRequest,
        cancel: &CancellationToken,
    ) -> Result<StoreReceipt, BackendError> {
        let value = self.post_json(STORE_ENDPOINT, request, cancel).await?;
        if let Some(message) = error_message(&value) {
            return Err(BackendError::Reported { message });
        }
        serde_json::from_value(value).map_err(|e| BackendError::InvalidPayload {
            message: format!("Invalid store receipt: {}", e),
        })
    }
}
