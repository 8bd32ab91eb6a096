//! In-memory backends for unit tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use aggr_core::{
    AggregatorError, AggregatorResult, ConnectionLogBackend, Dependencies, EntityKind,
    EntityRecord, EventStateBackend, HistorySeries, Location, ProcessBackend, QueryMessage,
    RegistryBackend, SearchBackend, Token,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub fn raw(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

pub fn device(id: &str, name: &str, device_type_id: Option<&str>) -> EntityRecord {
    let mut value = json!({"id": id, "name": name});
    if let Some(dt) = device_type_id {
        value["device_type_id"] = json!(dt);
    }
    EntityRecord::from_raw(EntityKind::Device, raw(value)).unwrap()
}

pub fn hub(id: &str, name: &str) -> EntityRecord {
    EntityRecord::from_raw(EntityKind::Hub, raw(json!({"id": id, "name": name}))).unwrap()
}

fn timeout(backend: &'static str) -> AggregatorError {
    AggregatorError::BackendTimeout { backend }
}

// =============================================================================
// Search
// =============================================================================

#[derive(Clone, Default)]
pub struct FakeSearch {
    hits: Arc<Mutex<Vec<Map<String, Value>>>>,
    seen: Arc<Mutex<Vec<QueryMessage>>>,
}

impl FakeSearch {
    pub fn returning(hits: Vec<Value>) -> Self {
        let search = Self::default();
        *search.hits.lock().unwrap() = hits.into_iter().map(raw).collect();
        search
    }

    pub fn queries(&self) -> Vec<QueryMessage> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for FakeSearch {
    async fn query(
        &self,
        _token: &Token,
        query: &QueryMessage,
    ) -> AggregatorResult<Vec<Map<String, Value>>> {
        self.seen.lock().unwrap().push(query.clone());
        Ok(self.hits.lock().unwrap().clone())
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Clone, Default)]
pub struct FakeRegistry {
    device_types: Arc<Mutex<Vec<Map<String, Value>>>>,
    locations: Arc<Mutex<Vec<Location>>>,
    hubs: Arc<Mutex<HashMap<String, Vec<String>>>>,
    device_type_calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeRegistry {
    pub fn with_device_type(self, id: &str, name: &str) -> Self {
        self.device_types
            .lock()
            .unwrap()
            .push(raw(json!({"id": id, "name": name})));
        self
    }

    pub fn with_location(self, id: &str, device_ids: &[&str]) -> Self {
        self.locations.lock().unwrap().push(Location {
            id: id.to_string(),
            name: id.to_string(),
            device_ids: device_ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        });
        self
    }

    pub fn with_hub(self, id: &str, device_ids: &[&str]) -> Self {
        self.hubs.lock().unwrap().insert(
            id.to_string(),
            device_ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn device_type_calls(&self) -> Vec<Vec<String>> {
        self.device_type_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryBackend for FakeRegistry {
    async fn list_device_types(
        &self,
        _token: &Token,
        ids: &[String],
    ) -> AggregatorResult<Vec<Map<String, Value>>> {
        self.device_type_calls.lock().unwrap().push(ids.to_vec());
        Ok(self
            .device_types
            .lock()
            .unwrap()
            .iter()
            .filter(|dt| {
                dt.get("id")
                    .and_then(Value::as_str)
                    .map_or(false, |id| ids.iter().any(|i| i == id))
            })
            .cloned()
            .collect())
    }

    async fn list_locations(
        &self,
        _token: &Token,
        ids: &[String],
    ) -> AggregatorResult<Vec<Location>> {
        Ok(self
            .locations
            .lock()
            .unwrap()
            .iter()
            .filter(|l| ids.contains(&l.id))
            .cloned()
            .collect())
    }

    async fn hub_device_ids(&self, _token: &Token, hub_id: &str) -> AggregatorResult<Vec<String>> {
        Ok(self
            .hubs
            .lock()
            .unwrap()
            .get(hub_id)
            .cloned()
            .unwrap_or_default())
    }
}

// =============================================================================
// Connection log
// =============================================================================

#[derive(Clone, Default)]
pub struct FakeConnectionLog {
    states: Arc<Mutex<HashMap<String, bool>>>,
    history: Arc<Mutex<HashSet<String>>>,
    edges: Arc<Mutex<HashMap<String, Value>>>,
    failing: bool,
    state_calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeConnectionLog {
    pub fn with_state(self, id: &str, online: bool) -> Self {
        self.states.lock().unwrap().insert(id.to_string(), online);
        self
    }

    pub fn with_history(self, id: &str) -> Self {
        self.history.lock().unwrap().insert(id.to_string());
        self
    }

    pub fn with_edge(self, id: &str, edge: Value) -> Self {
        self.edges.lock().unwrap().insert(id.to_string(), edge);
        self
    }

    /// Every call times out
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn state_calls(&self) -> usize {
        self.state_calls.lock().unwrap().len()
    }

    pub fn state_call_ids(&self) -> Vec<Vec<String>> {
        self.state_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionLogBackend for FakeConnectionLog {
    async fn check_states(
        &self,
        _token: &Token,
        _kind: EntityKind,
        ids: &[String],
    ) -> AggregatorResult<HashMap<String, bool>> {
        self.state_calls.lock().unwrap().push(ids.to_vec());
        if self.failing {
            return Err(timeout("connection-log"));
        }
        let states = self.states.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| states.get(id).map(|s| (id.clone(), *s)))
            .collect())
    }

    async fn history(
        &self,
        _token: &Token,
        kind: EntityKind,
        ids: &[String],
        _duration: &str,
    ) -> AggregatorResult<HashMap<String, HistorySeries>> {
        if self.failing {
            return Err(timeout("connection-log"));
        }
        let history = self.history.lock().unwrap();
        Ok(ids
            .iter()
            .filter(|id| history.contains(*id))
            .map(|id| {
                let series = HistorySeries {
                    name: kind.log_kind().to_string(),
                    tags: HashMap::from([(kind.log_kind().to_string(), id.clone())]),
                    columns: vec!["time".into(), "connected".into()],
                    values: vec![vec![json!("2024-01-01T00:00:00Z"), json!(true)]],
                };
                (id.clone(), series)
            })
            .collect())
    }

    async fn edges(
        &self,
        _token: &Token,
        _kind: EntityKind,
        ids: &[String],
        _duration: &str,
    ) -> AggregatorResult<HashMap<String, Value>> {
        if self.failing {
            return Err(timeout("connection-log"));
        }
        let edges = self.edges.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| edges.get(id).map(|e| (id.clone(), e.clone())))
            .collect())
    }
}

// =============================================================================
// Processes and events
// =============================================================================

#[derive(Clone, Default)]
pub struct FakeProcesses {
    deployments: Arc<Mutex<Vec<Map<String, Value>>>>,
    dependencies: Arc<Mutex<Vec<Dependencies>>>,
    params: Arc<Mutex<Vec<Vec<(String, String)>>>>,
}

impl FakeProcesses {
    pub fn with_deployment(self, id: &str, name: &str) -> Self {
        self.deployments
            .lock()
            .unwrap()
            .push(raw(json!({"id": id, "name": name})));
        self
    }

    pub fn with_dependencies(self, deps: Dependencies) -> Self {
        self.dependencies.lock().unwrap().push(deps);
        self
    }

    pub fn forwarded_params(&self) -> Vec<Vec<(String, String)>> {
        self.params.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessBackend for FakeProcesses {
    async fn list_deployments(
        &self,
        _token: &Token,
        params: &[(String, String)],
    ) -> AggregatorResult<Vec<Map<String, Value>>> {
        self.params.lock().unwrap().push(params.to_vec());
        Ok(self.deployments.lock().unwrap().clone())
    }

    async fn dependencies(
        &self,
        _token: &Token,
        deployment_ids: &[String],
    ) -> AggregatorResult<Vec<Dependencies>> {
        Ok(self
            .dependencies
            .lock()
            .unwrap()
            .iter()
            .filter(|d| deployment_ids.contains(&d.deployment_id))
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct FakeEvents {
    states: Arc<Mutex<HashMap<String, bool>>>,
    failing: bool,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeEvents {
    pub fn with_state(self, id: &str, online: bool) -> Self {
        self.states.lock().unwrap().insert(id.to_string(), online);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventStateBackend for FakeEvents {
    async fn check_event_states(
        &self,
        _token: &Token,
        ids: &[String],
    ) -> AggregatorResult<HashMap<String, bool>> {
        self.calls.lock().unwrap().push(ids.to_vec());
        if self.failing {
            return Err(timeout("event-manager"));
        }
        let states = self.states.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| states.get(id).map(|s| (id.clone(), *s)))
            .collect())
    }
}
