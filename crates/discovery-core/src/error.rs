//! Core error types for discovery-core.
//!
//! This module defines the error hierarchy using thiserror. Backend and
//! configuration errors are internal detail; everything that reaches the
//! presentation layer is first classified into a [`SessionFailure`].

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::discovery::RejectReason;

/// Core error type for discovery-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Backend (transport or contract) errors
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// OS keyring errors
    #[error("Credential store error: {0}")]
    Credentials(#[from] keyring::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors talking to the discovery backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Connection failed or was interrupted
    #[error("network error: {0}")]
    Network(String),

    /// Request did not complete in time
    #[error("request timed out")]
    Timeout,

    /// Caller is not (or no longer) authenticated
    #[error("not authenticated")]
    Unauthorized,

    /// Server answered with an unexpected status
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the contract
    #[error("malformed response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Network(_) | BackendError::Timeout => true,
            BackendError::Status { status, .. } => *status >= 500,
            BackendError::Unauthorized | BackendError::Decode(_) => false,
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The same profile appears twice in one daily queue
    #[error("Duplicate profile id in daily queue: {0}")]
    DuplicateProfile(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Classified failure exposed by the session engine.
///
/// Every error the engine encounters is mapped to exactly one of these kinds
/// before it becomes visible to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionFailure {
    /// The server (or the local gate) declined the decision.
    #[error("decision rejected: {reason}")]
    Rejected { reason: RejectReason },

    /// A request failed in a way that may succeed on retry.
    #[error("temporary network failure: {message}")]
    Transient { message: String },

    /// Today's queue could not be fetched.
    #[error("could not load today's profiles: {message}")]
    FetchFailed { message: String },

    /// The caller must log in again.
    #[error("authentication required: {message}")]
    Authentication { message: String },
}

impl SessionFailure {
    /// Classify a failed discovery fetch.
    pub fn from_fetch(err: &BackendError) -> Self {
        match err {
            BackendError::Unauthorized => SessionFailure::Authentication {
                message: err.to_string(),
            },
            other => SessionFailure::FetchFailed {
                message: other.to_string(),
            },
        }
    }

    /// Classify a failed decision or view submission.
    pub fn from_submit(err: &BackendError) -> Self {
        match err {
            BackendError::Unauthorized => SessionFailure::Authentication {
                message: err.to_string(),
            },
            other => SessionFailure::Transient {
                message: other.to_string(),
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionFailure::Transient { .. } | SessionFailure::FetchFailed { .. }
        )
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return BackendError::Timeout;
        }
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
            {
                return BackendError::Unauthorized;
            }
            return BackendError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            };
        }
        if err.is_decode() {
            return BackendError::Decode(err.to_string());
        }
        BackendError::Network(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_classified_as_authentication() {
        assert!(matches!(
            SessionFailure::from_fetch(&BackendError::Unauthorized),
            SessionFailure::Authentication { .. }
        ));
        assert!(matches!(
            SessionFailure::from_submit(&BackendError::Unauthorized),
            SessionFailure::Authentication { .. }
        ));
    }

    #[test]
    fn fetch_and_submit_failures_classify_differently() {
        let err = BackendError::Network("connection reset".into());
        assert!(matches!(
            SessionFailure::from_fetch(&err),
            SessionFailure::FetchFailed { .. }
        ));
        assert!(matches!(
            SessionFailure::from_submit(&err),
            SessionFailure::Transient { .. }
        ));
    }

    #[test]
    fn transient_backend_errors() {
        assert!(BackendError::Timeout.is_transient());
        assert!(BackendError::Status { status: 503, body: String::new() }.is_transient());
        assert!(!BackendError::Status { status: 400, body: String::new() }.is_transient());
        assert!(!BackendError::Unauthorized.is_transient());
    }

    #[test]
    fn failure_serializes_with_kind_tag() {
        let json = serde_json::to_value(SessionFailure::Transient {
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "transient");
    }
}
