//! Devices by device type

use aggr_core::{DeviceQuery, EntityRecord, SortSpec};
use aggr_gateway::PageParams;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::{auth_token, sort_or_default, state_filter};
use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters of `GET /device-types/{id}/devices`
#[derive(Debug, Default, Deserialize)]
pub struct DeviceTypeDevicesQuery {
    pub sort: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub state: Option<String>,
}

impl DeviceTypeDevicesQuery {
    pub fn to_query(&self, device_type_id: &str) -> Result<DeviceQuery, ApiError> {
        let page = PageParams {
            limit: self.limit.as_deref(),
            offset: self.offset.as_deref(),
            ..Default::default()
        }
        .parse()?;

        Ok(DeviceQuery {
            device_types: Some(vec![device_type_id.to_string()]),
            state: state_filter(&self.state)?,
            sort: sort_or_default(&self.sort),
            page: Some(page),
            ..Default::default()
        })
    }
}

/// GET /device-types/{id}/devices
pub async fn list_device_type_devices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_type_id): Path<String>,
    Query(params): Query<DeviceTypeDevicesQuery>,
) -> Result<Json<Vec<EntityRecord>>, ApiError> {
    let token = auth_token(&headers)?;
    let query = params.to_query(&device_type_id)?;
    let devices = state.aggregator().list_devices(&token, &query).await?;
    Ok(Json(devices))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceTypeIds {
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StateParam {
    pub state: Option<String>,
}

/// Every device of any of `ids`, sorted by name
fn all_of_types(ids: Vec<String>, state: &StateParam) -> Result<DeviceQuery, ApiError> {
    let ids: Vec<String> = ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    Ok(DeviceQuery {
        device_types: Some(ids),
        state: state_filter(&state.state)?,
        sort: SortSpec::default(),
        page: None,
        ..Default::default()
    })
}

/// POST /device-types-devices
pub async fn list_devices_of_types(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<StateParam>,
    body: Result<Json<DeviceTypeIds>, JsonRejection>,
) -> Result<Json<Vec<EntityRecord>>, ApiError> {
    let token = auth_token(&headers)?;
    let Json(body) = body.map_err(|e| {
        ApiError::BadRequest(format!("unable to parse request body: {}", e.body_text()))
    })?;
    let query = all_of_types(body.ids, &params)?;
    let devices = state.aggregator().list_devices(&token, &query).await?;
    Ok(Json(devices))
}
