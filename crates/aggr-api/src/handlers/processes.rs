//! Process listing handler

use aggr_core::ProcessRecord;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;

use super::auth_token;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /processes
///
/// Every query parameter is forwarded to the deployment listing unchanged.
pub async fn list_processes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<ProcessRecord>>, ApiError> {
    let token = auth_token(&headers)?;
    tracing::debug!(params = params.len(), "Listing processes");
    let processes = state.aggregator().list_processes(&token, &params).await?;
    Ok(Json(processes))
}
