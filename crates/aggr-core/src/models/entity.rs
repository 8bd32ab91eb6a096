//! Entity record models (devices, hubs)

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AggregatorError, AggregatorResult};

/// Kind of entity listed through the search index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Device,
    Hub,
}

impl EntityKind {
    /// Resource name used by the search index
    pub fn resource(&self) -> &'static str {
        match self {
            EntityKind::Device => "devices",
            EntityKind::Hub => "hubs",
        }
    }

    /// Kind segment used by the connection-log service
    pub fn log_kind(&self) -> &'static str {
        match self {
            EntityKind::Device => "device",
            EntityKind::Hub => "gateway",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.log_kind())
    }
}

/// Connection state attached as `log_state`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogState {
    Connected,
    Disconnected,
    Unknown,
}

impl LogState {
    /// State reported by the connection log (`true` = connected)
    pub fn from_online(online: bool) -> Self {
        if online {
            LogState::Connected
        } else {
            LogState::Disconnected
        }
    }

    /// Value of the `annotations.connected` feature in the search index
    pub fn annotation_value(&self) -> Value {
        match self {
            LogState::Connected => Value::Bool(true),
            LogState::Disconnected => Value::Bool(false),
            LogState::Unknown => Value::Null,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogState::Connected => "connected",
            LogState::Disconnected => "disconnected",
            LogState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogState {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(LogState::Connected),
            "disconnected" => Ok(LogState::Disconnected),
            "unknown" => Ok(LogState::Unknown),
            other => Err(AggregatorError::InvalidStateValue(format!(
                "'{}' (expected connected, disconnected or unknown)",
                other
            ))),
        }
    }
}

/// A device or hub as returned by the search index, plus enrichment
///
/// Fields this crate reads are typed; every other backend field is kept in
/// `fields` and serialized back at the top level unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_state: Option<LogState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_history: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_edge: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Keys owned by the typed part of [`EntityRecord`]
const RESERVED_KEYS: [&str; 6] = [
    "id",
    "device_type_id",
    "log_state",
    "device_type",
    "log_history",
    "log_edge",
];

impl EntityRecord {
    /// Build a record from a raw backend object.
    ///
    /// Fails with `DataIntegrity` if `id` is missing, not a string or empty.
    pub fn from_raw(kind: EntityKind, mut raw: Map<String, Value>) -> AggregatorResult<Self> {
        let id = match raw.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::String(_)) => {
                return Err(AggregatorError::DataIntegrity(format!(
                    "empty {} id",
                    kind.log_kind()
                )))
            }
            Some(_) => {
                return Err(AggregatorError::DataIntegrity(format!(
                    "unable to cast {} id to string",
                    kind.log_kind()
                )))
            }
            None => return Err(AggregatorError::missing_id(kind.log_kind())),
        };

        // Only a non-empty string is a usable type id; anything else stays
        // in the bag and goes back out untouched
        let device_type_id = match raw.remove("device_type_id") {
            Some(Value::String(dt)) if !dt.is_empty() => Some(dt),
            Some(other) => {
                raw.insert("device_type_id".to_string(), other);
                None
            }
            None => None,
        };

        for key in &RESERVED_KEYS[2..] {
            raw.remove(*key);
        }

        Ok(Self {
            id,
            device_type_id,
            log_state: None,
            device_type: None,
            log_history: None,
            log_edge: None,
            fields: raw,
        })
    }

    /// Convert a whole backend page, failing on the first bad record
    pub fn from_raw_list(
        kind: EntityKind,
        raw: Vec<Map<String, Value>>,
    ) -> AggregatorResult<Vec<Self>> {
        raw.into_iter()
            .map(|r| EntityRecord::from_raw(kind, r))
            .collect()
    }
}

/// A location groups devices by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub device_ids: Vec<String>,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub device_group_ids: Vec<String>,
    #[serde(default)]
    pub rdf_type: String,
}

/// One time series from the connection-log history endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySeries {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub columns: Vec<String>,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    pub values: Vec<Vec<Value>>,
}
