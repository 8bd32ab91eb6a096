//! Search-index query messages and caller query specifications

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AggregatorError, AggregatorResult};
use crate::models::LogState;

/// Default page size when the caller gives no `limit`
pub const DEFAULT_LIMIT: usize = 100;

/// Default sort field
pub const DEFAULT_SORT_FIELD: &str = "name";

/// Feature holding the connection annotation in the search index
pub const CONNECTED_FEATURE: &str = "annotations.connected";

/// Feature holding a device's type
pub const DEVICE_TYPE_FEATURE: &str = "device_type_id";

// =============================================================================
// Predicate tree
// =============================================================================

/// Comparison applied by a [`ConditionConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryOperation {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    Unequal,
    #[serde(rename = "any_value_in_feature")]
    AnyValueInFeature,
}

/// Leaf of the predicate tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub feature: String,
    pub operation: QueryOperation,
    pub value: Value,
    #[serde(default, rename = "ref", skip_serializing_if = "String::is_empty")]
    pub reference: String,
}

/// Boolean filter expression submitted to the search index
///
/// Serializes as `{"and": [...]}`, `{"or": [...]}`, `{"not": {...}}` or
/// `{"condition": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    And(Vec<Selection>),
    Or(Vec<Selection>),
    Not(Box<Selection>),
    Condition(ConditionConfig),
}

impl Selection {
    pub fn condition(feature: impl Into<String>, operation: QueryOperation, value: Value) -> Self {
        Selection::Condition(ConditionConfig {
            feature: feature.into(),
            operation,
            value,
            reference: String::new(),
        })
    }

    /// `id` is one of `ids`
    pub fn id_in(ids: &[String]) -> Self {
        Selection::condition(
            "id",
            QueryOperation::AnyValueInFeature,
            Value::Array(ids.iter().cloned().map(Value::String).collect()),
        )
    }

    /// `device_type_id` is one of `ids`
    pub fn device_type_in(ids: &[String]) -> Self {
        Selection::condition(
            DEVICE_TYPE_FEATURE,
            QueryOperation::AnyValueInFeature,
            Value::Array(ids.iter().cloned().map(Value::String).collect()),
        )
    }

    /// Connection annotation equals the value that encodes `state`
    pub fn connection_state(state: LogState) -> Self {
        Selection::condition(CONNECTED_FEATURE, QueryOperation::Equal, state.annotation_value())
    }

    /// AND of the given leaves; a single leaf is returned unwrapped
    pub fn all_of(mut leaves: Vec<Selection>) -> Option<Self> {
        match leaves.len() {
            0 => None,
            1 => leaves.pop(),
            _ => Some(Selection::And(leaves)),
        }
    }
}

// =============================================================================
// Query message
// =============================================================================

/// Cursor position: the sort value and id of the last item already seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListAfter {
    pub sort_field_value: Value,
    pub id: String,
}

/// Paging and sorting shared by `find` and `list_ids`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryListCommons {
    pub limit: usize,
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<ListAfter>,
    pub rights: String,
    pub sort_by: String,
    pub sort_desc: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFind {
    #[serde(flatten)]
    pub commons: QueryListCommons,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub search: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Selection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryListIds {
    #[serde(flatten)]
    pub commons: QueryListCommons,
    pub ids: Vec<String>,
}

/// Body of `POST /v3/query` on the permission search service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryMessage {
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub find: Option<QueryFind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_ids: Option<QueryListIds>,
}

impl QueryMessage {
    pub fn find(resource: impl Into<String>, find: QueryFind) -> Self {
        Self {
            resource: resource.into(),
            find: Some(find),
            ..Default::default()
        }
    }

    pub fn list_ids(resource: impl Into<String>, list_ids: QueryListIds) -> Self {
        Self {
            resource: resource.into(),
            list_ids: Some(list_ids),
            ..Default::default()
        }
    }
}

// =============================================================================
// Caller query specification
// =============================================================================

/// Sort field and direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub desc: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: DEFAULT_SORT_FIELD.to_string(),
            desc: false,
        }
    }
}

impl SortSpec {
    pub fn new(field: impl Into<String>, desc: bool) -> Self {
        Self {
            field: field.into(),
            desc,
        }
    }

    /// Parse `<field>`, `<field>.asc` or `<field>.desc`
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (field, desc) = if let Some(field) = raw.strip_suffix(".desc") {
            (field, true)
        } else if let Some(field) = raw.strip_suffix(".asc") {
            (field, false)
        } else {
            (raw, false)
        };
        if field.is_empty() {
            return SortSpec {
                desc,
                ..Default::default()
            };
        }
        SortSpec::new(field, desc)
    }
}

/// Requested page: offset mode or cursor mode
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    Offset { limit: usize, offset: usize },
    Cursor { limit: usize, after: ListAfter },
}

impl Default for Page {
    fn default() -> Self {
        Page::Offset {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    pub fn limit(&self) -> usize {
        match self {
            Page::Offset { limit, .. } | Page::Cursor { limit, .. } => *limit,
        }
    }

    /// Same position, different page size
    pub fn with_limit(self, limit: usize) -> Self {
        match self {
            Page::Offset { offset, .. } => Page::Offset { limit, offset },
            Page::Cursor { after, .. } => Page::Cursor { limit, after },
        }
    }

    /// Paging fields of a backend query for this page
    pub fn commons(&self, rights: &str, sort: &SortSpec) -> QueryListCommons {
        let (limit, offset, after) = match self {
            Page::Offset { limit, offset } => (*limit, *offset, None),
            Page::Cursor { limit, after } => (*limit, 0, Some(after.clone())),
        };
        QueryListCommons {
            limit,
            offset,
            after,
            rights: rights.to_string(),
            sort_by: sort.field.clone(),
            sort_desc: sort.desc,
        }
    }
}

/// Parse a `state` filter value
pub fn parse_state_filter(raw: &str) -> AggregatorResult<LogState> {
    raw.trim().parse()
}

/// Parameters of a device listing
///
/// `page == None` requests every matching device. The default is the
/// first page of [`DEFAULT_LIMIT`] devices.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceQuery {
    pub search: Option<String>,
    pub ids: Option<Vec<String>>,
    pub location: Option<String>,
    /// Only devices of one of these device types
    pub device_types: Option<Vec<String>>,
    pub state: Option<LogState>,
    pub sort: SortSpec,
    pub page: Option<Page>,
    /// History window (e.g. `4h`); enables history enrichment
    pub log: Option<String>,
}

impl Default for DeviceQuery {
    fn default() -> Self {
        Self {
            search: None,
            ids: None,
            location: None,
            device_types: None,
            state: None,
            sort: SortSpec::default(),
            page: Some(Page::default()),
            log: None,
        }
    }
}

/// Parameters of a hub listing
///
/// `page == None` requests the complete list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubQuery {
    pub search: Option<String>,
    pub sort: SortSpec,
    pub page: Option<Page>,
    pub log: Option<String>,
}

/// Parameters of `GET /hubs/{id}/devices`
///
/// `page == None` returns every device of the hub.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubDeviceQuery {
    pub sort: SortSpec,
    pub page: Option<Page>,
    pub state: Option<LogState>,
}

/// Validate a history window such as `4h`, `30m` or `1h30m`
pub fn validate_duration(raw: &str) -> AggregatorResult<()> {
    const UNITS: [&str; 9] = ["ns", "us", "µs", "ms", "s", "m", "h", "d", "w"];

    let invalid = || AggregatorError::InvalidRequest(format!("invalid duration '{}'", raw));
    let mut rest = raw;
    if rest.is_empty() {
        return Err(invalid());
    }
    while !rest.is_empty() {
        let digits = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        rest = &rest[digits..];
        let unit = UNITS
            .iter()
            .filter(|u| rest.starts_with(*u))
            .max_by_key(|u| u.len())
            .ok_or_else(invalid)?;
        rest = &rest[unit.len()..];
    }
    Ok(())
}
