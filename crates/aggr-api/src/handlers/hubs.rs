//! Hub listing handlers

use aggr_core::{validate_duration, EntityRecord, HubDeviceQuery, HubQuery};
use aggr_gateway::PageParams;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::{auth_token, non_empty, sort_or_default, state_filter};
use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters of `GET /hubs`
#[derive(Debug, Default, Deserialize)]
pub struct HubListQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub log: Option<String>,
}

impl HubListQuery {
    /// Without search, sort, limit or offset the complete list is requested
    pub fn to_query(&self) -> Result<HubQuery, ApiError> {
        let paging = PageParams {
            limit: self.limit.as_deref(),
            offset: self.offset.as_deref(),
            ..Default::default()
        };
        let page = if paging.is_empty()
            && non_empty(&self.search).is_none()
            && non_empty(&self.sort).is_none()
        {
            None
        } else {
            Some(paging.parse()?)
        };

        let log = non_empty(&self.log).map(str::to_string);
        if let Some(duration) = &log {
            validate_duration(duration)?;
        }

        Ok(HubQuery {
            search: non_empty(&self.search).map(str::to_string),
            sort: sort_or_default(&self.sort),
            page,
            log,
        })
    }
}

/// Query parameters of `GET /hubs/{id}/devices`
#[derive(Debug, Default, Deserialize)]
pub struct HubDeviceListQuery {
    pub sort: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub state: Option<String>,
}

impl HubDeviceListQuery {
    /// Without limit, offset or sort every device of the hub is returned
    pub fn to_query(&self) -> Result<HubDeviceQuery, ApiError> {
        let paging = PageParams {
            limit: self.limit.as_deref(),
            offset: self.offset.as_deref(),
            ..Default::default()
        };
        let page = if paging.is_empty() && non_empty(&self.sort).is_none() {
            None
        } else {
            Some(paging.parse()?)
        };

        Ok(HubDeviceQuery {
            sort: sort_or_default(&self.sort),
            page,
            state: state_filter(&self.state)?,
        })
    }
}

/// GET /hubs
pub async fn list_hubs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HubListQuery>,
) -> Result<Json<Vec<EntityRecord>>, ApiError> {
    let token = auth_token(&headers)?;
    let query = params.to_query()?;
    let hubs = state.aggregator().list_hubs(&token, &query).await?;
    Ok(Json(hubs))
}

/// GET /hubs/{hub_id}/devices
pub async fn list_hub_devices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(hub_id): Path<String>,
    Query(params): Query<HubDeviceListQuery>,
) -> Result<Json<Vec<EntityRecord>>, ApiError> {
    let token = auth_token(&headers)?;
    let query = params.to_query()?;
    let devices = state
        .aggregator()
        .hub_devices(&token, &hub_id, &query)
        .await?;
    Ok(Json(devices))
}
