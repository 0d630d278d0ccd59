//! Error model used by Taskboard API client operations.

use std::io;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Represents the error conditions that can occur while talking to the
/// Taskboard API: HTTP failures, an explicit `success:false` rejection,
/// authentication failures, timeouts, network-level failures,
/// serialization problems and other unexpected errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http {status}: {message}")]
    Http { status: StatusCode, message: String },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl ApiError {
    /// Constructs an HTTP error variant from a non-success response.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Http {
            status,
            message: message.into(),
        }
    }

    /// True when the server could not be reached at all. These failures
    /// are recovered by queueing the mutation locally for later replay.
    pub fn is_offline(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout(_))
    }

    /// True when the session is no longer valid and must be torn down.
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            ApiError::Authentication(_) => true,
            ApiError::Http { status, .. } => *status == StatusCode::UNAUTHORIZED,
            _ => false,
        }
    }

    /// True when the primary route does not exist and a legacy fallback
    /// route should be attempted.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Http { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    /// Human-readable message for surfacing to the user, with a generic
    /// fallback when the error carries nothing useful.
    pub fn user_message(&self) -> String {
        let message = match self {
            ApiError::Rejected(message) => message.clone(),
            ApiError::Http { message, .. } => message.clone(),
            ApiError::Authentication(message) => message.clone(),
            other => other.to_string(),
        };
        if message.trim().is_empty() {
            "Something went wrong. Please try again.".to_string()
        } else {
            message
        }
    }
}

impl From<reqwest::Error> for ApiError {
    /// Converts reqwest errors into semantic ApiError variants.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if err.is_status() {
            let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            ApiError::Http {
                status,
                message: err.to_string(),
            }
        } else if err.is_connect() || err.is_request() {
            ApiError::Network(err.to_string())
        } else {
            ApiError::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    /// Converts serde_json decode/encode failures into serialization errors.
    fn from(err: serde_json::Error) -> Self {
        ApiError::Serialization(err.to_string())
    }
}
