//! HTTP request handlers
//!
//! Handlers only translate HTTP into aggregator calls; every listing is
//! implemented once in [`aggr_gateway::Aggregator`].

pub mod device_types;
pub mod devices;
pub mod hubs;
pub mod legacy;
pub mod processes;

use aggr_core::{parse_state_filter, LogState, SortSpec, Token};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use crate::error::ApiError;

/// The inbound `Authorization` header, forwarded verbatim to every backend
pub(crate) fn auth_token(headers: &HeaderMap) -> Result<Token, ApiError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(Token::new)
        .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))
}

/// Query string values: an empty value counts as absent
pub(crate) fn non_empty(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn sort_or_default(raw: &Option<String>) -> SortSpec {
    non_empty(raw).map(SortSpec::parse).unwrap_or_default()
}

pub(crate) fn state_filter(raw: &Option<String>) -> Result<Option<LogState>, ApiError> {
    Ok(non_empty(raw).map(parse_state_filter).transpose()?)
}
