//! Process deployments and their dependency graphs

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{AggregatorError, AggregatorResult};

/// Dependencies of one process deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dependencies {
    pub deployment_id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub devices: Vec<DeviceDependency>,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub events: Vec<EventDependency>,
    #[serde(skip)]
    pub online: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDependency {
    pub device_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub bpmn_resources: Vec<BpmnResource>,
    #[serde(skip)]
    pub online: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDependency {
    pub event_id: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub bpmn_resources: Vec<BpmnResource>,
    #[serde(skip)]
    pub online: bool,
}

/// Task of the process model that uses a dependency
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BpmnResource {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

/// Why a process is reported offline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineReason {
    #[serde(rename = "type")]
    pub reason_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Value>,
    pub description: String,
}

impl OfflineReason {
    pub fn device_offline(device: &DeviceDependency) -> Self {
        Self {
            reason_type: "device-offline".to_string(),
            id: device.device_id.clone(),
            additional_info: Some(json!({
                "name": device.name,
                "tasks": device.bpmn_resources,
            })),
            description: format!("device {} is offline", device.name),
        }
    }

    pub fn event_offline(event: &EventDependency) -> Self {
        Self {
            reason_type: "event-filter-offline".to_string(),
            id: event.event_id.clone(),
            additional_info: Some(json!({ "tasks": event.bpmn_resources })),
            description: format!("event-filter {} is offline", event.event_id),
        }
    }
}

impl Dependencies {
    /// Reasons for every offline dependency, devices first
    pub fn offline_reasons(&self) -> Vec<OfflineReason> {
        let devices = self
            .devices
            .iter()
            .filter(|d| !d.online)
            .map(OfflineReason::device_offline);
        let events = self
            .events
            .iter()
            .filter(|e| !e.online)
            .map(OfflineReason::event_offline);
        devices.chain(events).collect()
    }
}

/// A deployment as listed by the process engine, plus liveness
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub id: String,
    pub online: bool,
    pub offline_reasons: Vec<OfflineReason>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ProcessRecord {
    /// Build from a raw engine object; a missing or non-string `id` is rejected
    pub fn from_raw(mut raw: Map<String, Value>) -> AggregatorResult<Self> {
        let id = match raw.remove("id") {
            Some(Value::String(id)) => id,
            _ => {
                return Err(AggregatorError::DataIntegrity(
                    "unable to read process id".to_string(),
                ))
            }
        };
        raw.remove("online");
        raw.remove("offline_reasons");
        Ok(Self {
            id,
            online: true,
            offline_reasons: Vec::new(),
            fields: raw,
        })
    }
}
