//! Common error types for the aggregation core

use thiserror::Error;

/// Result type for aggregation operations
pub type AggregatorResult<T> = Result<T, AggregatorError>;

/// Errors that can occur while composing a query or joining backend results
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// `limit`, `offset` or cursor parameters are malformed
    #[error("Invalid page parameter: {0}")]
    InvalidPageParameter(String),

    /// The requested location does not exist (or is not readable)
    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    /// State filter outside `connected`/`disconnected`/`unknown`
    #[error("Invalid state value: {0}")]
    InvalidStateValue(String),

    /// Any other malformed caller input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No credential was supplied with the request
    #[error("Missing authorization")]
    Unauthorized,

    /// Backend could not be reached (connect/transport failure)
    #[error("Backend {backend} unavailable: {message}")]
    BackendUnavailable {
        /// Backend name, e.g. "permission-search"
        backend: &'static str,
        /// Transport error text
        message: String,
    },

    /// Backend did not answer in time
    #[error("Backend {backend} timed out")]
    BackendTimeout {
        /// Backend name
        backend: &'static str,
    },

    /// Backend answered with a non-success status or an unreadable body
    #[error("Backend {backend} error {status}: {message}")]
    Backend {
        /// Backend name
        backend: &'static str,
        /// Upstream HTTP status (0 when the body could not be decoded)
        status: u16,
        /// Upstream error text
        message: String,
    },

    /// A backend record lacks a usable id
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AggregatorError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AggregatorError::InvalidPageParameter(_) => 400,
            AggregatorError::UnknownLocation(_) => 400,
            AggregatorError::InvalidStateValue(_) => 400,
            AggregatorError::InvalidRequest(_) => 400,
            AggregatorError::Unauthorized => 401,
            AggregatorError::BackendUnavailable { .. } => 503,
            AggregatorError::BackendTimeout { .. } => 504,
            AggregatorError::Backend { .. } => 502,
            AggregatorError::DataIntegrity(_) => 500,
            AggregatorError::Internal(_) => 500,
        }
    }

    pub(crate) fn missing_id(kind: &str) -> Self {
        AggregatorError::DataIntegrity(format!("unable to get {} id", kind))
    }
}
