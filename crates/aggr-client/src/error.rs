//! Error types for backend client operations

use aggr_core::AggregatorError;
use thiserror::Error;

/// Result type alias for backend client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to a backend
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Base URL cannot carry path segments (e.g. `mailto:`)
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Server returned an error response
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Timeout
    #[error("Request timed out")]
    Timeout,

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Backend URL is unset or `-`
    #[error("Backend not configured")]
    NotConfigured,
}

impl ClientError {
    /// Failure while reading a response body: a timeout stays a timeout,
    /// anything else is a malformed body
    pub(crate) fn body(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::ParseError(err.to_string())
        }
    }

    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }

    /// Attach the backend name and lift into the aggregation error taxonomy
    pub fn into_aggregator(self, backend: &'static str) -> AggregatorError {
        match self {
            ClientError::HttpError(e) if e.is_timeout() => {
                AggregatorError::BackendTimeout { backend }
            }
            ClientError::HttpError(e) if e.is_connect() || e.is_request() => {
                AggregatorError::BackendUnavailable {
                    backend,
                    message: e.to_string(),
                }
            }
            ClientError::HttpError(e) if e.is_decode() || e.is_body() => AggregatorError::Backend {
                backend,
                status: 0,
                message: e.to_string(),
            },
            ClientError::HttpError(e) => AggregatorError::BackendUnavailable {
                backend,
                message: e.to_string(),
            },
            ClientError::Timeout => AggregatorError::BackendTimeout { backend },
            ClientError::ConnectionFailed(message) => {
                AggregatorError::BackendUnavailable { backend, message }
            }
            ClientError::NotConfigured => AggregatorError::BackendUnavailable {
                backend,
                message: "no url configured".to_string(),
            },
            ClientError::ServerError { status, message } => AggregatorError::Backend {
                backend,
                status,
                message,
            },
            ClientError::ParseError(message) => AggregatorError::Backend {
                backend,
                status: 0,
                message,
            },
            ClientError::IoError(e) => AggregatorError::BackendUnavailable {
                backend,
                message: e.to_string(),
            },
            ClientError::InvalidUrl(e) => AggregatorError::Internal(format!("{}: {}", backend, e)),
            ClientError::InvalidBaseUrl(url) => {
                AggregatorError::Internal(format!("{}: invalid base url {}", backend, url))
            }
        }
    }
}
