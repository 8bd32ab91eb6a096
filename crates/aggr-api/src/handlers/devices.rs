//! Device listing handlers

use aggr_core::{validate_duration, DeviceQuery, EntityRecord};
use aggr_gateway::PageParams;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::{auth_token, non_empty, sort_or_default, state_filter};
use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters of `GET /devices`
#[derive(Debug, Default, Deserialize)]
pub struct DeviceListQuery {
    pub search: Option<String>,
    /// Comma-separated id allow-list
    pub ids: Option<String>,
    pub location: Option<String>,
    pub state: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    #[serde(rename = "after.id")]
    pub after_id: Option<String>,
    #[serde(rename = "after.sort_field_value")]
    pub after_sort_field_value: Option<String>,
    pub log: Option<String>,
}

impl DeviceListQuery {
    pub fn to_query(&self) -> Result<DeviceQuery, ApiError> {
        let page = PageParams {
            limit: self.limit.as_deref(),
            offset: self.offset.as_deref(),
            after_id: self.after_id.as_deref(),
            after_sort_field_value: self.after_sort_field_value.as_deref(),
        }
        .parse()?;

        let log = non_empty(&self.log).map(str::to_string);
        if let Some(duration) = &log {
            validate_duration(duration)?;
        }

        Ok(DeviceQuery {
            search: non_empty(&self.search).map(str::to_string),
            ids: non_empty(&self.ids).map(split_ids),
            location: non_empty(&self.location).map(str::to_string),
            device_types: None,
            state: state_filter(&self.state)?,
            sort: sort_or_default(&self.sort),
            page: Some(page),
            log,
        })
    }
}

/// `"d1, d2,,d3"` -> `["d1", "d2", "d3"]`
fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|id| id.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|id| !id.is_empty())
        .collect()
}

/// GET /devices
pub async fn list_devices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DeviceListQuery>,
) -> Result<Json<Vec<EntityRecord>>, ApiError> {
    let token = auth_token(&headers)?;
    let query = params.to_query()?;
    let devices = state.aggregator().list_devices(&token, &query).await?;
    Ok(Json(devices))
}
