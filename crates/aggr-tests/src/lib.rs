//! End-to-end test harness for the query aggregator
//!
//! Every backend the aggregator talks to is mocked in-process by one axum
//! router serving all backend paths:
//!
//! - `POST /v3/query` - permission search with real search/filter/sort/
//!   offset/cursor semantics
//! - `POST /intern/{state,history,logedge}/...` - connection log
//! - `GET /hubs/{id}/devices` - device repository
//! - `GET /deployment`, `GET /dependencies` - process services
//! - `GET /event-states` - event manager
//!
//! [`Stack`] starts the mocks, wires real clients to them and serves the
//! aggregator API on a second ephemeral port.
//!
//! # Test Structure
//!
//! - `devices_e2e_test.rs` - `/devices` filters, paging and enrichment
//! - `hubs_e2e_test.rs` - `/hubs` and `/hubs/{id}/devices`
//! - `device_types_e2e_test.rs` - devices listed by device type
//! - `processes_e2e_test.rs` - process liveness
//! - `legacy_e2e_test.rs` - old path-parameter routes

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aggr_api::{create_router, AppState};
use aggr_client::testing::TestServer;
use aggr_client::{
    BackendConfig, ConnectionLogClient, EventStateClient, ProcessClient, RegistryClient,
    SearchClient,
};
use aggr_core::{QueryListCommons, QueryMessage, QueryOperation, Selection};
use aggr_gateway::pagination::field_value;
use aggr_gateway::{Aggregator, AggregatorOptions, Backends, DEFAULT_FIND_ALL_BATCH};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};

/// Credential every mock backend insists on
pub const TOKEN: &str = "Bearer e2e-token";

type Object = Map<String, Value>;

fn object(value: Value) -> Object {
    match value {
        Value::Object(map) => map,
        _ => Object::new(),
    }
}

// =============================================================================
// Fixture
// =============================================================================

/// Backend data served by the mocks, plus a record of what they received
#[derive(Default)]
pub struct Fixture {
    devices: Vec<Object>,
    hubs: Vec<Object>,
    device_types: Vec<Object>,
    locations: Vec<Object>,
    hub_members: HashMap<String, Vec<String>>,
    device_states: HashMap<String, bool>,
    hub_states: HashMap<String, bool>,
    history: HashSet<String>,
    deployments: Vec<Object>,
    dependencies: Vec<Value>,
    event_states: HashMap<String, bool>,
    state_check_delay: Option<Duration>,
    queries: Mutex<Vec<QueryMessage>>,
    deployment_params: Mutex<Vec<Vec<(String, String)>>>,
    state_checks: Mutex<Vec<Vec<String>>>,
}

impl Fixture {
    pub fn device(mut self, id: &str, name: &str, device_type_id: Option<&str>) -> Self {
        let mut device = object(json!({"id": id, "name": name}));
        if let Some(dt) = device_type_id {
            device.insert("device_type_id".into(), json!(dt));
        }
        self.devices.push(device);
        self
    }

    pub fn hub(mut self, id: &str, name: &str) -> Self {
        self.hubs.push(object(json!({"id": id, "name": name})));
        self
    }

    pub fn device_type(mut self, id: &str, name: &str) -> Self {
        self.device_types.push(object(json!({"id": id, "name": name})));
        self
    }

    pub fn location(mut self, id: &str, device_ids: &[&str]) -> Self {
        self.locations.push(object(json!({
            "id": id,
            "name": format!("location {}", id),
            "device_ids": device_ids,
            "device_group_ids": null,
        })));
        self
    }

    pub fn hub_devices(mut self, hub_id: &str, device_ids: &[&str]) -> Self {
        self.hub_members.insert(
            hub_id.to_string(),
            device_ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn device_state(mut self, id: &str, online: bool) -> Self {
        self.device_states.insert(id.to_string(), online);
        self
    }

    pub fn hub_state(mut self, id: &str, online: bool) -> Self {
        self.hub_states.insert(id.to_string(), online);
        self
    }

    /// Serve a one-point history and a log edge for `id`
    pub fn history(mut self, id: &str) -> Self {
        self.history.insert(id.to_string());
        self
    }

    pub fn deployment(mut self, id: &str, name: &str) -> Self {
        self.deployments.push(object(json!({"id": id, "name": name})));
        self
    }

    /// Raw dependency graph as served by the deployment service
    pub fn dependencies(mut self, graph: Value) -> Self {
        self.dependencies.push(graph);
        self
    }

    pub fn event_state(mut self, id: &str, online: bool) -> Self {
        self.event_states.insert(id.to_string(), online);
        self
    }

    /// Delay every connection-state check
    pub fn slow_state_checks(mut self, delay: Duration) -> Self {
        self.state_check_delay = Some(delay);
        self
    }

    pub fn queries(&self) -> Vec<QueryMessage> {
        self.queries.lock().unwrap().clone()
    }

    pub fn deployment_params(&self) -> Vec<Vec<(String, String)>> {
        self.deployment_params.lock().unwrap().clone()
    }

    pub fn state_checks(&self) -> Vec<Vec<String>> {
        self.state_checks.lock().unwrap().clone()
    }

    fn collection(&self, resource: &str) -> Vec<Object> {
        match resource {
            "devices" => annotate(&self.devices, &self.device_states),
            "hubs" => annotate(&self.hubs, &self.hub_states),
            "device-types" => self.device_types.clone(),
            "locations" => self.locations.clone(),
            _ => Vec::new(),
        }
    }
}

/// Devices `d1..d9` named `foo1..3`, `bar1..3`, `batz1..3` and location
/// `l1 = {d2, d3, d4}`
pub fn nine_devices() -> Fixture {
    let names = [
        "foo1", "foo2", "foo3", "bar1", "bar2", "bar3", "batz1", "batz2", "batz3",
    ];
    let mut fixture = Fixture::default();
    for (i, name) in names.iter().enumerate() {
        fixture = fixture.device(&format!("d{}", i + 1), name, None);
    }
    fixture.location("l1", &["d2", "d3", "d4"])
}

/// The search index stores the connection state as `annotations.connected`
fn annotate(items: &[Object], states: &HashMap<String, bool>) -> Vec<Object> {
    items
        .iter()
        .cloned()
        .map(|mut item| {
            let state = id_of(&item).and_then(|id| states.get(id)).copied();
            if let Some(online) = state {
                item.insert("annotations".into(), json!({"connected": online}));
            }
            item
        })
        .collect()
}

fn id_of(item: &Object) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}

// =============================================================================
// Search index semantics
// =============================================================================

fn matches(selection: &Selection, item: &Object) -> bool {
    match selection {
        Selection::And(all) => all.iter().all(|s| matches(s, item)),
        Selection::Or(any) => any.iter().any(|s| matches(s, item)),
        Selection::Not(inner) => !matches(inner, item),
        Selection::Condition(condition) => {
            let actual = field_value(item, &condition.feature);
            match condition.operation {
                QueryOperation::Equal => actual == condition.value,
                QueryOperation::Unequal => actual != condition.value,
                QueryOperation::AnyValueInFeature => condition
                    .value
                    .as_array()
                    .is_some_and(|values| values.contains(&actual)),
            }
        }
    }
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Order of (sort value, id) keys under the requested direction
fn cmp_keys(a: (&Value, &str), b: (&Value, &str), desc: bool) -> Ordering {
    let ordering = cmp_values(a.0, b.0).then_with(|| a.1.cmp(b.1));
    if desc {
        ordering.reverse()
    } else {
        ordering
    }
}

fn page(mut items: Vec<Object>, commons: &QueryListCommons) -> Vec<Object> {
    let sort_by = commons.sort_by.as_str();
    if !sort_by.is_empty() {
        items.sort_by(|a, b| {
            cmp_keys(
                (&field_value(a, sort_by), id_of(a).unwrap_or_default()),
                (&field_value(b, sort_by), id_of(b).unwrap_or_default()),
                commons.sort_desc,
            )
        });
    }

    let start = match &commons.after {
        Some(after) => items
            .iter()
            .position(|item| {
                cmp_keys(
                    (&field_value(item, sort_by), id_of(item).unwrap_or_default()),
                    (&after.sort_field_value, after.id.as_str()),
                    commons.sort_desc,
                ) == Ordering::Greater
            })
            .unwrap_or(items.len()),
        None => commons.offset.min(items.len()),
    };

    items.into_iter().skip(start).take(commons.limit).collect()
}

// =============================================================================
// Mock handlers
// =============================================================================

fn authorized(headers: &HeaderMap) -> Result<(), StatusCode> {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(TOKEN) => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn search_query(
    State(fixture): State<Arc<Fixture>>,
    headers: HeaderMap,
    Json(query): Json<QueryMessage>,
) -> Result<Json<Vec<Object>>, StatusCode> {
    authorized(&headers)?;
    fixture.queries.lock().unwrap().push(query.clone());
    let items = fixture.collection(&query.resource);

    if let Some(find) = &query.find {
        let search = find.search.to_lowercase();
        let hits = items
            .into_iter()
            .filter(|item| {
                search.is_empty()
                    || item
                        .get("name")
                        .and_then(Value::as_str)
                        .is_some_and(|name| name.to_lowercase().contains(&search))
            })
            .filter(|item| find.filter.as_ref().map_or(true, |s| matches(s, item)))
            .collect();
        return Ok(Json(page(hits, &find.commons)));
    }

    if let Some(list) = &query.list_ids {
        let hits = items
            .into_iter()
            .filter(|item| id_of(item).is_some_and(|id| list.ids.iter().any(|i| i == id)))
            .collect();
        return Ok(Json(page(hits, &list.commons)));
    }

    Err(StatusCode::BAD_REQUEST)
}

fn states_for<'a>(fixture: &'a Fixture, kind: &str) -> Result<&'a HashMap<String, bool>, StatusCode> {
    match kind {
        "device" => Ok(&fixture.device_states),
        "gateway" => Ok(&fixture.hub_states),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn check_states(
    State(fixture): State<Arc<Fixture>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Json(ids): Json<Vec<String>>,
) -> Result<Json<HashMap<String, bool>>, StatusCode> {
    authorized(&headers)?;
    fixture.state_checks.lock().unwrap().push(ids.clone());
    if let Some(delay) = fixture.state_check_delay {
        tokio::time::sleep(delay).await;
    }
    let states = states_for(&fixture, &kind)?;
    Ok(Json(
        ids.iter()
            .filter_map(|id| states.get(id).map(|s| (id.clone(), *s)))
            .collect(),
    ))
}

async fn history(
    State(fixture): State<Arc<Fixture>>,
    Path((kind, _duration)): Path<(String, String)>,
    headers: HeaderMap,
    Json(ids): Json<Vec<String>>,
) -> Result<Json<Value>, StatusCode> {
    authorized(&headers)?;
    let states = states_for(&fixture, &kind)?;
    let series: Vec<Value> = ids
        .iter()
        .filter(|id| fixture.history.contains(*id))
        .map(|id| {
            let mut tags = Object::new();
            tags.insert(kind.clone(), json!(id));
            json!({
                "name": kind,
                "tags": tags,
                "columns": ["time", "connected"],
                "values": [["2024-01-01T00:00:00Z", states.get(id).copied().unwrap_or(false)]],
            })
        })
        .collect();
    Ok(Json(json!([{ "Series": series }])))
}

async fn log_edges(
    State(fixture): State<Arc<Fixture>>,
    Path((kind, _duration)): Path<(String, String)>,
    headers: HeaderMap,
    Json(ids): Json<Vec<String>>,
) -> Result<Json<HashMap<String, Value>>, StatusCode> {
    authorized(&headers)?;
    let states = states_for(&fixture, &kind)?;
    Ok(Json(
        ids.iter()
            .filter(|id| fixture.history.contains(*id))
            .map(|id| {
                let connected = states.get(id).copied().unwrap_or(false);
                (
                    id.clone(),
                    json!({"time": "2023-12-31T23:00:00Z", "connected": connected}),
                )
            })
            .collect(),
    ))
}

async fn hub_devices(
    State(fixture): State<Arc<Fixture>>,
    Path(hub_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>, StatusCode> {
    authorized(&headers)?;
    fixture
        .hub_members
        .get(&hub_id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn deployments(
    State(fixture): State<Arc<Fixture>>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Object>>, StatusCode> {
    authorized(&headers)?;
    fixture.deployment_params.lock().unwrap().push(params);
    Ok(Json(fixture.deployments.clone()))
}

fn requested_ids(params: &HashMap<String, String>) -> Vec<String> {
    params
        .get("ids")
        .map(|ids| ids.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

async fn dependencies(
    State(fixture): State<Arc<Fixture>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Value>>, StatusCode> {
    authorized(&headers)?;
    let ids = requested_ids(&params);
    Ok(Json(
        fixture
            .dependencies
            .iter()
            .filter(|d| {
                d.get("deployment_id")
                    .and_then(Value::as_str)
                    .is_some_and(|id| ids.iter().any(|i| i == id))
            })
            .cloned()
            .collect(),
    ))
}

async fn event_states(
    State(fixture): State<Arc<Fixture>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<HashMap<String, bool>>, StatusCode> {
    authorized(&headers)?;
    Ok(Json(
        requested_ids(&params)
            .into_iter()
            .filter_map(|id| fixture.event_states.get(&id).map(|s| (id.clone(), *s)))
            .collect(),
    ))
}

/// One router answering for every backend
pub fn mock_backends(fixture: Arc<Fixture>) -> Router {
    Router::new()
        .route("/v3/query", post(search_query))
        .route("/intern/state/{kind}/check", post(check_states))
        .route("/intern/history/{kind}/{duration}", post(history))
        .route("/intern/logedge/{kind}/{duration}", post(log_edges))
        .route("/hubs/{hub_id}/devices", get(hub_devices))
        .route("/deployment", get(deployments))
        .route("/dependencies", get(dependencies))
        .route("/event-states", get(event_states))
        .with_state(fixture)
}

// =============================================================================
// Stack
// =============================================================================

#[derive(Debug, Clone)]
pub struct StackOptions {
    pub fail_open_liveness: bool,
    pub find_all_batch_size: usize,
    pub legacy_routes: bool,
    /// Request timeout of the connection-log client
    pub connection_log_timeout: Duration,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            fail_open_liveness: true,
            find_all_batch_size: DEFAULT_FIND_ALL_BATCH,
            legacy_routes: true,
            connection_log_timeout: Duration::from_secs(5),
        }
    }
}

/// Mock backends plus the aggregator API wired to them
pub struct Stack {
    pub fixture: Arc<Fixture>,
    _mocks: TestServer,
    api: TestServer,
    http: reqwest::Client,
}

impl Stack {
    pub async fn start(fixture: Fixture) -> Self {
        Self::start_with(fixture, StackOptions::default()).await
    }

    pub async fn start_with(fixture: Fixture, options: StackOptions) -> Self {
        let fixture = Arc::new(fixture);
        let mocks = TestServer::start(mock_backends(Arc::clone(&fixture)))
            .await
            .expect("start mock backends");

        let config = mocks.backend_config();
        let search = SearchClient::new(&config).expect("search client");
        let registry = RegistryClient::new(search.clone(), &config).expect("registry client");
        let connection_log = ConnectionLogClient::new(
            &BackendConfig::new(mocks.base_url())
                .with_timeouts(options.connection_log_timeout, Duration::from_secs(2)),
        )
        .expect("connection-log client");
        let processes = ProcessClient::new(&config, &config).expect("process client");
        let events = EventStateClient::new(&config).expect("event-state client");

        let aggregator = Aggregator::new(
            Backends {
                search: Arc::new(search),
                registry: Arc::new(registry),
                connection_log: Arc::new(connection_log),
                processes: Arc::new(processes),
                events: Arc::new(events),
            },
            AggregatorOptions {
                fail_open_liveness: options.fail_open_liveness,
                find_all_batch_size: options.find_all_batch_size,
                ..Default::default()
            },
        );
        let state = AppState::new(aggregator).with_legacy_routes(options.legacy_routes);
        let api = TestServer::start(create_router(state))
            .await
            .expect("start aggregator api");

        Self {
            fixture,
            _mocks: mocks,
            api,
            http: reqwest::Client::new(),
        }
    }

    /// Base URL of the aggregator API
    pub fn base_url(&self) -> String {
        self.api.base_url()
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{}", self.api.base_url(), path))
            .header("Authorization", TOKEN)
            .send()
            .await
            .expect("request aggregator")
    }

    /// GET `path`, expecting 200 and a JSON body
    pub async fn get_json(&self, path: &str) -> Value {
        let response = self.get(path).await;
        let status = response.status();
        let body = response.text().await.expect("read body");
        assert_eq!(status, 200, "GET {} -> {}", path, body);
        serde_json::from_str(&body).expect("JSON body")
    }

    /// POST `body` to `path`, expecting 200 and a JSON body
    pub async fn post_json(&self, path: &str, body: &Value) -> Value {
        let response = self
            .http
            .post(format!("{}{}", self.api.base_url(), path))
            .header("Authorization", TOKEN)
            .json(body)
            .send()
            .await
            .expect("request aggregator");
        let status = response.status();
        let text = response.text().await.expect("read body");
        assert_eq!(status, 200, "POST {} -> {}", path, text);
        serde_json::from_str(&text).expect("JSON body")
    }

    /// Search queries received so far; clears the record
    pub fn take_queries(&self) -> Vec<QueryMessage> {
        std::mem::take(&mut *self.fixture.queries.lock().unwrap())
    }
}

/// `id` of every item of a JSON array
pub fn ids(body: &Value) -> Vec<String> {
    field_of(body, "id")
}

/// `name` of every item of a JSON array
pub fn names(body: &Value) -> Vec<String> {
    field_of(body, "name")
}

fn field_of(body: &Value, field: &str) -> Vec<String> {
    body.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.get(field).and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
