//! Error types for litmap core.
//!
//! Uses `thiserror` for public API error types. The classifiers themselves
//! never fail; errors come from the backend boundary, configuration, the
//! session store and local I/O.

use crate::state::Stage;
use std::path::PathBuf;

/// Top-level error type for the litmap core library.
#[derive(Debug, thiserror::Error)]
pub enum LitmapError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from talking to the discovery backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("HTTP {status} from {endpoint}: {message}")]
    Http {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Backend reported an error: {message}")]
    Reported { message: String },

    #[error("Invalid backend payload: {message}")]
    InvalidPayload { message: String },

    #[error("Request to {endpoint} timed out after {timeout_secs}s")]
    Timeout { endpoint: String, timeout_secs: u64 },

    #[error("Request to {endpoint} was cancelled")]
    Cancelled { endpoint: String },

    #[error("Invalid backend URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Background task failed: {message}")]
    TaskFailed { message: String },
}

impl BackendError {
    /// Whether the request was abandoned rather than answered.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BackendError::Cancelled { .. })
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from the session store.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Stale {stage} result (request {generation}, current {current})")]
    Stale {
        stage: Stage,
        generation: u64,
        current: u64,
    },

    #[error("Missing prerequisite: {message}")]
    MissingPrerequisite { message: String },
}

/// A type alias for results using the top-level `LitmapError`.
pub type Result<T> = std::result::Result<T, LitmapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_backend() {
        let err = LitmapError::Backend(BackendError::Http {
            endpoint: "/api/clusters/".into(),
            status: 500,
            message: "boom".into(),
        });
        assert_eq!(
            err.to_string(),
            "Backend error: HTTP 500 from /api/clusters/: boom"
        );
    }

    #[test]
    fn test_error_display_timeout() {
        let err = BackendError::Timeout {
            endpoint: "/api/synthesis/".into(),
            timeout_secs: 180,
        };
        assert_eq!(
            err.to_string(),
            "Request to /api/synthesis/ timed out after 180s"
        );
    }

    #[test]
    fn test_error_display_stale() {
        let err = LitmapError::State(StateError::Stale {
            stage: Stage::Clusters,
            generation: 1,
            current: 2,
        });
        assert_eq!(
            err.to_string(),
            "State error: Stale clusters result (request 1, current 2)"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = LitmapError::Config(ConfigError::Invalid {
            message: "backend.timeout_secs must be positive".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid configuration: backend.timeout_secs must be positive"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LitmapError = io_err.into();
        assert!(matches!(err, LitmapError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: LitmapError = serde_err.into();
        assert!(matches!(err, LitmapError::Serialization(_)));
    }

    #[test]
    fn test_is_cancelled() {
        let cancelled = BackendError::Cancelled {
            endpoint: "/api/gaps/".into(),
        };
        let reported = BackendError::Reported {
            message: "x".into(),
        };
        assert!(cancelled.is_cancelled());
        assert!(!reported.is_cancelled());
    }
}
