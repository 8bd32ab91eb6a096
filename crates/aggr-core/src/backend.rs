//! Backend traits - the seams between the aggregation pipeline and the
//! services it composes

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::AggregatorResult;
use crate::models::{Dependencies, EntityKind, HistorySeries, Location, QueryMessage};

/// Caller credential, forwarded verbatim as the `Authorization` header
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

// =============================================================================
// Primary listing
// =============================================================================

/// Permission-aware search index
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run one query message and return the raw matching objects
    async fn query(
        &self,
        token: &Token,
        query: &QueryMessage,
    ) -> AggregatorResult<Vec<Map<String, Value>>>;
}

/// Device-type, location and hub membership lookups
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Device types with the given ids (readable ones only)
    async fn list_device_types(
        &self,
        token: &Token,
        ids: &[String],
    ) -> AggregatorResult<Vec<Map<String, Value>>>;

    /// Locations with the given ids (readable ones only)
    async fn list_locations(&self, token: &Token, ids: &[String])
        -> AggregatorResult<Vec<Location>>;

    /// Ids of the devices attached to a hub
    async fn hub_device_ids(&self, token: &Token, hub_id: &str) -> AggregatorResult<Vec<String>>;
}

// =============================================================================
// Enrichment
// =============================================================================

/// Connection state and history per entity
#[async_trait]
pub trait ConnectionLogBackend: Send + Sync {
    /// Current connection state, `true` = connected. Ids without an entry are unknown.
    async fn check_states(
        &self,
        token: &Token,
        kind: EntityKind,
        ids: &[String],
    ) -> AggregatorResult<HashMap<String, bool>>;

    /// Connection history over `duration`, keyed by entity id
    async fn history(
        &self,
        token: &Token,
        kind: EntityKind,
        ids: &[String],
        duration: &str,
    ) -> AggregatorResult<HashMap<String, HistorySeries>>;

    /// State transitions at the start of the `duration` window, keyed by entity id
    async fn edges(
        &self,
        token: &Token,
        kind: EntityKind,
        ids: &[String],
        duration: &str,
    ) -> AggregatorResult<HashMap<String, Value>>;
}

/// Process deployments and their dependencies
#[async_trait]
pub trait ProcessBackend: Send + Sync {
    /// Deployment listing; `params` are forwarded as the query string
    async fn list_deployments(
        &self,
        token: &Token,
        params: &[(String, String)],
    ) -> AggregatorResult<Vec<Map<String, Value>>>;

    /// Dependency graphs of the given deployments
    async fn dependencies(
        &self,
        token: &Token,
        deployment_ids: &[String],
    ) -> AggregatorResult<Vec<Dependencies>>;
}

/// Liveness of event filters
#[async_trait]
pub trait EventStateBackend: Send + Sync {
    /// `true` = event filter running. Ids without an entry are unknown.
    async fn check_event_states(
        &self,
        token: &Token,
        ids: &[String],
    ) -> AggregatorResult<HashMap<String, bool>>;
}
