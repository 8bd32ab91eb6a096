//! Path-parameter routes of the old API
//!
//! Each route is rewritten into the query parameters of its modern
//! equivalent and served by the same aggregator call.

use aggr_core::{DeviceQuery, EntityRecord};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use super::auth_token;
use super::devices::DeviceListQuery;
use super::hubs::HubListQuery;
use crate::error::ApiError;
use crate::state::AppState;

type Listing = Result<Json<Vec<EntityRecord>>, ApiError>;

fn sort_param(feature: &str, direction: &str) -> Result<String, ApiError> {
    match direction {
        "asc" | "desc" => Ok(format!("{}.{}", feature, direction)),
        other => Err(ApiError::BadRequest(format!(
            "sort direction must be asc or desc, got '{}'",
            other
        ))),
    }
}

async fn devices(state: &AppState, headers: &HeaderMap, params: DeviceListQuery) -> Listing {
    let token = auth_token(headers)?;
    let query = params.to_query()?;
    Ok(Json(state.aggregator().list_devices(&token, &query).await?))
}

/// Old filter and history routes were never paged: every match is returned
async fn all_devices(state: &AppState, headers: &HeaderMap, params: DeviceListQuery) -> Listing {
    let token = auth_token(headers)?;
    let query = DeviceQuery {
        page: None,
        ..params.to_query()?
    };
    Ok(Json(state.aggregator().list_devices(&token, &query).await?))
}

async fn hubs(state: &AppState, headers: &HeaderMap, params: HubListQuery) -> Listing {
    let token = auth_token(headers)?;
    let query = params.to_query()?;
    Ok(Json(state.aggregator().list_hubs(&token, &query).await?))
}

// =============================================================================
// Devices
// =============================================================================

/// GET /list/devices/{limit}/{offset}
pub async fn list_devices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((limit, offset)): Path<(String, String)>,
) -> Listing {
    let params = DeviceListQuery {
        limit: Some(limit),
        offset: Some(offset),
        ..Default::default()
    };
    devices(&state, &headers, params).await
}

/// GET /list/devices/{limit}/{offset}/{feature}/{direction}
pub async fn list_devices_ordered(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((limit, offset, feature, direction)): Path<(String, String, String, String)>,
) -> Listing {
    let params = DeviceListQuery {
        limit: Some(limit),
        offset: Some(offset),
        sort: Some(sort_param(&feature, &direction)?),
        ..Default::default()
    };
    devices(&state, &headers, params).await
}

/// GET /search/devices/{query}/{limit}/{offset}
pub async fn search_devices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((search, limit, offset)): Path<(String, String, String)>,
) -> Listing {
    let params = DeviceListQuery {
        search: Some(search),
        limit: Some(limit),
        offset: Some(offset),
        ..Default::default()
    };
    devices(&state, &headers, params).await
}

/// GET /search/devices/{query}/{limit}/{offset}/{feature}/{direction}
pub async fn search_devices_ordered(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((search, limit, offset, feature, direction)): Path<(
        String,
        String,
        String,
        String,
        String,
    )>,
) -> Listing {
    let params = DeviceListQuery {
        search: Some(search),
        limit: Some(limit),
        offset: Some(offset),
        sort: Some(sort_param(&feature, &direction)?),
        ..Default::default()
    };
    devices(&state, &headers, params).await
}

/// GET /filter/devices/state/{state}
pub async fn filter_devices_by_state(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(value): Path<String>,
) -> Listing {
    let params = DeviceListQuery {
        state: Some(value),
        ..Default::default()
    };
    all_devices(&state, &headers, params).await
}

/// GET /filter/devices/state/{state}/name/{direction}
pub async fn filter_devices_by_state_ordered(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((value, direction)): Path<(String, String)>,
) -> Listing {
    let params = DeviceListQuery {
        state: Some(value),
        sort: Some(sort_param("name", &direction)?),
        ..Default::default()
    };
    all_devices(&state, &headers, params).await
}

/// GET /history/devices/{duration}
pub async fn device_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(duration): Path<String>,
) -> Listing {
    let params = DeviceListQuery {
        log: Some(duration),
        ..Default::default()
    };
    all_devices(&state, &headers, params).await
}

// =============================================================================
// Gateways
// =============================================================================

/// GET /history/gateways/{duration}
pub async fn gateway_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(duration): Path<String>,
) -> Listing {
    let params = HubListQuery {
        log: Some(duration),
        ..Default::default()
    };
    hubs(&state, &headers, params).await
}

/// GET /list/gateways/{limit}/{offset}
pub async fn list_gateways(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((limit, offset)): Path<(String, String)>,
) -> Listing {
    let params = HubListQuery {
        limit: Some(limit),
        offset: Some(offset),
        ..Default::default()
    };
    hubs(&state, &headers, params).await
}

/// GET /search/gateways/{query}/{limit}/{offset}
pub async fn search_gateways(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((search, limit, offset)): Path<(String, String, String)>,
) -> Listing {
    let params = HubListQuery {
        search: Some(search),
        limit: Some(limit),
        offset: Some(offset),
        ..Default::default()
    };
    hubs(&state, &headers, params).await
}
