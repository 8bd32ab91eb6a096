//! aggr-api - REST API layer for the device/hub/process aggregator
//!
//! Serves the listing endpoints on top of [`aggr_gateway::Aggregator`].
//!
//! # Usage
//!
//! ```ignore
//! use aggr_api::{create_router, AppState};
//!
//! let aggregator = Aggregator::new(backends, AggregatorOptions::default());
//! let state = AppState::new(aggregator).with_legacy_routes(true);
//! let router = create_router(state);
//! ```

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the aggregator REST API router with the given application state
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        .route("/devices", get(handlers::devices::list_devices))
        .route("/hubs", get(handlers::hubs::list_hubs))
        .route(
            "/hubs/{hub_id}/devices",
            get(handlers::hubs::list_hub_devices),
        )
        .route(
            "/device-types/{id}/devices",
            get(handlers::device_types::list_device_type_devices),
        )
        .route(
            "/device-types-devices",
            post(handlers::device_types::list_devices_of_types),
        )
        .route("/processes", get(handlers::processes::list_processes));

    if state.legacy_routes() {
        router = router.merge(legacy_routes());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn legacy_routes() -> Router<AppState> {
    use handlers::legacy;

    Router::new()
        .route(
            "/list/devices/{limit}/{offset}",
            get(legacy::list_devices),
        )
        .route(
            "/list/devices/{limit}/{offset}/{feature}/{direction}",
            get(legacy::list_devices_ordered),
        )
        .route(
            "/search/devices/{query}/{limit}/{offset}",
            get(legacy::search_devices),
        )
        .route(
            "/search/devices/{query}/{limit}/{offset}/{feature}/{direction}",
            get(legacy::search_devices_ordered),
        )
        .route(
            "/filter/devices/state/{state}",
            get(legacy::filter_devices_by_state),
        )
        .route(
            "/filter/devices/state/{state}/name/{direction}",
            get(legacy::filter_devices_by_state_ordered),
        )
        .route("/history/devices/{duration}", get(legacy::device_history))
        .route("/history/gateways/{duration}", get(legacy::gateway_history))
        .route(
            "/list/gateways/{limit}/{offset}",
            get(legacy::list_gateways),
        )
        .route(
            "/search/gateways/{query}/{limit}/{offset}",
            get(legacy::search_gateways),
        )
}
