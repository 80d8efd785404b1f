//! Configuration system for litmap.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/litmap/config.toml` and/or `.litmap/config.toml`
//! in the workspace directory.

use crate::error::ConfigError;
use crate::rules::{self, KeywordRule};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LitmapConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Where the discovery backend lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL; endpoint paths such as `/api/clusters/` are joined onto it.
    pub base_url: String,
    /// Whole-request timeout. Clustering and synthesis can take minutes.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5005".to_string(),
            timeout_secs: 180,
            connect_timeout_secs: 10,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Parameters sent with every `/api/discover` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub start_year: i64,
    /// Defaults to the current year when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i64>,
    pub max_results: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            start_year: 2015,
            end_year: None,
            max_results: 50,
        }
    }
}

/// Keyword tables for the cluster transformer, highest priority first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "rules::default_method_rules")]
    pub method_rules: Vec<KeywordRule>,
    #[serde(default = "rules::default_dataset_rules")]
    pub dataset_rules: Vec<KeywordRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            method_rules: rules::default_method_rules(),
            dataset_rules: rules::default_dataset_rules(),
        }
    }
}

/// Background persistence of session results to `/api/paper/store`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Post clusters to the backend store after every clustering pass.
    pub auto_store: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { auto_store: true }
    }
}

impl LitmapConfig {
    /// Return human-readable warnings for suspicious settings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.backend.timeout_secs == 0 {
            warnings.push("backend.timeout_secs is 0; every request will time out".to_string());
        }
        if url::Url::parse(&self.backend.base_url).is_err() {
            warnings.push(format!(
                "backend.base_url '{}' is not a valid URL",
                self.backend.base_url
            ));
        }
        if let Some(end) = self.discovery.end_year
            && end < self.discovery.start_year
        {
            warnings.push(format!(
                "discovery.end_year {} is before start_year {}",
                end, self.discovery.start_year
            ));
        }
        if self.discovery.max_results == 0 {
            warnings.push("discovery.max_results is 0; discovery returns nothing".to_string());
        }
        if self.classifier.method_rules.is_empty() {
            warnings.push(
                "classifier.method_rules is empty; every cluster will be 'Various'".to_string(),
            );
        }
        for rule in self
            .classifier
            .method_rules
            .iter()
            .chain(&self.classifier.dataset_rules)
        {
            if rule.keyword.trim().is_empty() {
                warnings.push(format!("rule for '{}' has an empty keyword", rule.label));
            }
        }

        warnings
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "litmap", "litmap")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".litmap").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `LITMAP_`)
/// 3. Explicit config file, or workspace-local config (`.litmap/config.toml`)
/// 4. User config (`~/.config/litmap/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&LitmapConfig>,
) -> Result<LitmapConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(LitmapConfig::default()));

    // User-level config
    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    } else if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (LITMAP_BACKEND__BASE_URL, LITMAP_STORE__AUTO_STORE, etc.)
    figment = figment.merge(Env::prefixed("LITMAP_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

/// Check whether any litmap configuration file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}
