//! Application state for the aggregator API

use std::sync::Arc;

use aggr_gateway::Aggregator;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<Aggregator>,
    /// Mount the path-parameter routes of the old API
    legacy_routes: bool,
}

impl AppState {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            legacy_routes: false,
        }
    }

    pub fn with_legacy_routes(mut self, enabled: bool) -> Self {
        self.legacy_routes = enabled;
        self
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn legacy_routes(&self) -> bool {
        self.legacy_routes
    }
}
