//! Process Liveness Aggregator
//!
//! A process is online when every device and event filter it depends on is
//! live. Liveness sources are advisory: an id they do not report is live.

use std::collections::{HashMap, HashSet};

use aggr_core::{
    AggregatorResult, ConnectionLogBackend, Dependencies, EntityKind, EventStateBackend, Token,
};
use tracing::{debug, warn};

/// Set `online` on every dependency graph and on each of its entries.
///
/// Issues exactly one device-liveness and one event-liveness call for the
/// deduplicated union of ids. With `fail_open` a failing liveness source is
/// logged and treated as reporting nothing.
pub async fn set_online_state(
    connection_log: &dyn ConnectionLogBackend,
    events: &dyn EventStateBackend,
    token: &Token,
    mut dependencies: Vec<Dependencies>,
    fail_open: bool,
) -> AggregatorResult<Vec<Dependencies>> {
    let device_ids = union(
        dependencies
            .iter()
            .flat_map(|d| d.devices.iter().map(|dev| dev.device_id.as_str())),
    );
    let event_ids = union(
        dependencies
            .iter()
            .flat_map(|d| d.events.iter().map(|e| e.event_id.as_str())),
    );

    let device_states = advisory(
        "device",
        connection_log
            .check_states(token, EntityKind::Device, &device_ids)
            .await,
        fail_open,
    )?;
    let event_states = advisory(
        "event",
        events.check_event_states(token, &event_ids).await,
        fail_open,
    )?;

    for graph in dependencies.iter_mut() {
        graph.online = true;
        for device in graph.devices.iter_mut() {
            device.online = is_live(&device_states, &device.device_id);
            graph.online &= device.online;
        }
        for event in graph.events.iter_mut() {
            event.online = is_live(&event_states, &event.event_id);
            graph.online &= event.online;
        }
        if !graph.online {
            debug!(deployment_id = %graph.deployment_id, "Process offline");
        }
    }
    Ok(dependencies)
}

/// Deduplicated ids in first-seen order
fn union<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

fn is_live(states: &HashMap<String, bool>, id: &str) -> bool {
    states.get(id).copied().unwrap_or(true)
}

fn advisory(
    category: &str,
    result: AggregatorResult<HashMap<String, bool>>,
    fail_open: bool,
) -> AggregatorResult<HashMap<String, bool>> {
    match result {
        Ok(states) => Ok(states),
        Err(e) if fail_open => {
            warn!(category, error = %e, "Liveness source failed, assuming live");
            Ok(HashMap::new())
        }
        Err(e) => Err(e),
    }
}
