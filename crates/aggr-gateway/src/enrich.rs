//! Join/Enrichment Pipeline
//!
//! Attaches connection state, device types, history and edges to a primary
//! entity list. Every attachment is keyed by entity id, the input order is
//! preserved and no entity is ever dropped (except by the explicit state
//! filter).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use aggr_core::{
    validate_duration, AggregatorError, AggregatorResult, ConnectionLogBackend, EntityKind,
    EntityRecord, LogState, RegistryBackend, Token,
};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Enrichment {
    registry: Arc<dyn RegistryBackend>,
    connection_log: Arc<dyn ConnectionLogBackend>,
}

impl Enrichment {
    pub fn new(
        registry: Arc<dyn RegistryBackend>,
        connection_log: Arc<dyn ConnectionLogBackend>,
    ) -> Self {
        Self {
            registry,
            connection_log,
        }
    }

    /// Attach `log_state` (devices and hubs) and `device_type` (devices).
    ///
    /// Ids the connection log does not know keep `log_state` unset.
    pub async fn complete_list(
        &self,
        token: &Token,
        kind: EntityKind,
        mut entities: Vec<EntityRecord>,
    ) -> AggregatorResult<Vec<EntityRecord>> {
        if entities.is_empty() {
            return Ok(entities);
        }

        let ids = ids_of(&entities);
        let states = self.connection_log.check_states(token, kind, &ids).await?;
        for entity in entities.iter_mut() {
            entity.log_state = states.get(&entity.id).copied().map(LogState::from_online);
        }

        if kind == EntityKind::Device {
            self.attach_device_types(token, &mut entities).await?;
        }

        debug!(%kind, count = entities.len(), states = states.len(), "Completed list");
        Ok(entities)
    }

    async fn attach_device_types(
        &self,
        token: &Token,
        entities: &mut [EntityRecord],
    ) -> AggregatorResult<()> {
        let mut seen = HashSet::new();
        let type_ids: Vec<String> = entities
            .iter()
            .filter_map(|e| e.device_type_id.as_deref())
            .filter(|id| seen.insert(*id))
            .map(str::to_string)
            .collect();
        if type_ids.is_empty() {
            return Ok(());
        }

        let types: HashMap<String, Value> = self
            .registry
            .list_device_types(token, &type_ids)
            .await?
            .into_iter()
            .filter_map(|dt| match dt.get("id") {
                Some(Value::String(id)) => Some((id.clone(), Value::Object(dt))),
                _ => None,
            })
            .collect();

        for entity in entities.iter_mut() {
            let Some(type_id) = entity.device_type_id.as_deref() else {
                continue;
            };
            match types.get(type_id) {
                Some(device_type) => entity.device_type = Some(device_type.clone()),
                None => warn!(
                    device_id = %entity.id,
                    device_type_id = %type_id,
                    "Device type not found"
                ),
            }
        }
        Ok(())
    }

    /// `complete_list`, then keep entities whose state equals `state`.
    /// `unknown` matches entities without a connection-log entry.
    pub async fn filter_by_state(
        &self,
        token: &Token,
        kind: EntityKind,
        entities: Vec<EntityRecord>,
        state: LogState,
    ) -> AggregatorResult<Vec<EntityRecord>> {
        let mut entities = self.complete_list(token, kind, entities).await?;
        entities.retain(|e| e.log_state.unwrap_or(LogState::Unknown) == state);
        Ok(entities)
    }

    /// `complete_list` followed by `attach_history`
    pub async fn complete_history(
        &self,
        token: &Token,
        kind: EntityKind,
        entities: Vec<EntityRecord>,
        duration: &str,
    ) -> AggregatorResult<Vec<EntityRecord>> {
        validate_duration(duration)?;
        let entities = self.complete_list(token, kind, entities).await?;
        self.attach_history(token, kind, entities, duration).await
    }

    /// Attach `log_history` and `log_edge` for `duration` and normalize an
    /// unset `log_state` to `unknown`.
    pub async fn attach_history(
        &self,
        token: &Token,
        kind: EntityKind,
        mut entities: Vec<EntityRecord>,
        duration: &str,
    ) -> AggregatorResult<Vec<EntityRecord>> {
        validate_duration(duration)?;
        if entities.is_empty() {
            return Ok(entities);
        }

        let ids = ids_of(&entities);
        let mut history = self
            .connection_log
            .history(token, kind, &ids, duration)
            .await?;
        let mut edges = self
            .connection_log
            .edges(token, kind, &ids, duration)
            .await?;

        for entity in entities.iter_mut() {
            if let Some(series) = history.remove(&entity.id) {
                let series = serde_json::to_value(series).map_err(|e| {
                    AggregatorError::Internal(format!("history of {}: {}", entity.id, e))
                })?;
                entity.log_history = Some(series);
            }
            entity.log_edge = edges.remove(&entity.id);
            entity.log_state.get_or_insert(LogState::Unknown);
        }
        Ok(entities)
    }
}

fn ids_of(entities: &[EntityRecord]) -> Vec<String> {
    entities.iter().map(|e| e.id.clone()).collect()
}
