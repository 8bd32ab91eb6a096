//! Query Builder - caller query to one search-index message

use std::collections::HashSet;

use aggr_core::{
    AggregatorError, AggregatorResult, EntityKind, LogState, Page, QueryFind, QueryListIds,
    QueryMessage, RegistryBackend, Selection, SortSpec, Token,
};
use tracing::debug;

/// Outcome of planning a listing
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedQuery {
    /// The result is known to be empty; no backend call is needed
    Empty,
    /// Send this message to the search index
    Query(QueryMessage),
}

/// Resolve the effective id restriction from an explicit id list and a
/// location.
///
/// `None` means unrestricted. With both inputs the result is their
/// intersection in the order of the explicit list.
pub async fn resolve_restriction(
    registry: &dyn RegistryBackend,
    token: &Token,
    ids: Option<&[String]>,
    location: Option<&str>,
) -> AggregatorResult<Option<Vec<String>>> {
    let location_ids = match location {
        Some(location) => Some(location_members(registry, token, location).await?),
        None => None,
    };
    Ok(intersect(ids, location_ids))
}

async fn location_members(
    registry: &dyn RegistryBackend,
    token: &Token,
    location: &str,
) -> AggregatorResult<Vec<String>> {
    let locations = registry
        .list_locations(token, &[location.to_string()])
        .await?;
    let found = locations
        .into_iter()
        .find(|l| l.id == location)
        .ok_or_else(|| AggregatorError::UnknownLocation(location.to_string()))?;
    debug!(location = %found.id, members = found.device_ids.len(), "Resolved location");
    Ok(found.device_ids)
}

fn intersect(ids: Option<&[String]>, location_ids: Option<Vec<String>>) -> Option<Vec<String>> {
    match (ids, location_ids) {
        (Some(ids), Some(members)) => {
            let members: HashSet<&str> = members.iter().map(String::as_str).collect();
            Some(
                dedup(ids)
                    .into_iter()
                    .filter(|id| members.contains(id.as_str()))
                    .collect(),
            )
        }
        (Some(ids), None) => Some(dedup(ids)),
        (None, Some(members)) => Some(dedup(&members)),
        (None, None) => None,
    }
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Builds search-index messages for one resource
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    kind: EntityKind,
    rights: &'a str,
    sort: &'a SortSpec,
    page: &'a Page,
    search: Option<&'a str>,
    restriction: Option<&'a [String]>,
    device_types: Option<&'a [String]>,
    state: Option<LogState>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(kind: EntityKind, rights: &'a str, sort: &'a SortSpec, page: &'a Page) -> Self {
        Self {
            kind,
            rights,
            sort,
            page,
            search: None,
            restriction: None,
            device_types: None,
            state: None,
        }
    }

    /// Free-text term; empty text is ignored
    pub fn search(mut self, search: Option<&'a str>) -> Self {
        self.search = search.filter(|s| !s.is_empty());
        self
    }

    pub fn restrict_to(mut self, ids: Option<&'a [String]>) -> Self {
        self.restriction = ids;
        self
    }

    /// Only entities whose device type is one of `ids`
    pub fn device_types(mut self, ids: Option<&'a [String]>) -> Self {
        self.device_types = ids;
        self
    }

    pub fn state(mut self, state: Option<LogState>) -> Self {
        self.state = state;
        self
    }

    pub fn build(self) -> PlannedQuery {
        if self.page.limit() == 0 || self.device_types.is_some_and(<[String]>::is_empty) {
            return PlannedQuery::Empty;
        }

        if let Some(ids) = self.restriction {
            if ids.is_empty() {
                return PlannedQuery::Empty;
            }
            if self.search.is_none() && self.state.is_none() && self.device_types.is_none() {
                let page = self.page.clone().with_limit(self.page.limit().min(ids.len()));
                return PlannedQuery::Query(QueryMessage::list_ids(
                    self.kind.resource(),
                    QueryListIds {
                        commons: page.commons(self.rights, self.sort),
                        ids: ids.to_vec(),
                    },
                ));
            }
        }

        let mut leaves = Vec::new();
        if let Some(ids) = self.restriction {
            leaves.push(Selection::id_in(ids));
        }
        if let Some(types) = self.device_types {
            leaves.push(Selection::device_type_in(types));
        }
        if let Some(state) = self.state {
            leaves.push(Selection::connection_state(state));
        }

        PlannedQuery::Query(QueryMessage::find(
            self.kind.resource(),
            QueryFind {
                commons: self.page.commons(self.rights, self.sort),
                search: self.search.unwrap_or_default().to_string(),
                filter: Selection::all_of(leaves),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggr_core::{ListAfter, QueryOperation};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_intersection_keeps_explicit_order() {
        let result = intersect(
            Some(&ids(&["d4", "d9", "d2", "d4"])),
            Some(ids(&["d2", "d3", "d4"])),
        );
        assert_eq!(result, Some(ids(&["d4", "d2"])));
        assert_eq!(intersect(None, None), None);
        assert_eq!(intersect(None, Some(ids(&["d1"]))), Some(ids(&["d1"])));
    }

    #[test]
    fn test_unrestricted_find() {
        let sort = SortSpec::default();
        let page = Page::default();
        let planned = QueryBuilder::new(EntityKind::Device, "r", &sort, &page)
            .search(Some("foo"))
            .build();

        let PlannedQuery::Query(msg) = planned else {
            panic!("expected a query");
        };
        let find = msg.find.unwrap();
        assert_eq!(msg.resource, "devices");
        assert_eq!(find.search, "foo");
        assert_eq!(find.filter, None);
        assert_eq!(find.commons.limit, 100);
        assert_eq!(find.commons.sort_by, "name");
        assert!(!find.commons.sort_desc);
    }

    #[test]
    fn test_restriction_without_search_uses_list_ids() {
        let sort = SortSpec::new("name", true);
        let page = Page::Offset {
            limit: 100,
            offset: 1,
        };
        let restriction = ids(&["d1", "d2", "d3"]);
        let planned = QueryBuilder::new(EntityKind::Device, "r", &sort, &page)
            .restrict_to(Some(&restriction))
            .build();

        let PlannedQuery::Query(msg) = planned else {
            panic!("expected a query");
        };
        assert!(msg.find.is_none());
        let list = msg.list_ids.unwrap();
        assert_eq!(list.ids, restriction);
        assert_eq!(list.commons.limit, 3);
        assert_eq!(list.commons.offset, 1);
        assert!(list.commons.sort_desc);
    }

    #[test]
    fn test_restriction_with_state_builds_and_filter() {
        let sort = SortSpec::default();
        let page = Page::Cursor {
            limit: 5,
            after: ListAfter {
                sort_field_value: json!("foo1"),
                id: "d1".into(),
            },
        };
        let restriction = ids(&["d1", "d2"]);
        let planned = QueryBuilder::new(EntityKind::Device, "r", &sort, &page)
            .restrict_to(Some(&restriction))
            .state(Some(LogState::Disconnected))
            .build();

        let PlannedQuery::Query(msg) = planned else {
            panic!("expected a query");
        };
        let find = msg.find.unwrap();
        assert_eq!(find.commons.after.as_ref().map(|a| a.id.as_str()), Some("d1"));
        assert_eq!(
            find.filter,
            Some(Selection::And(vec![
                Selection::condition("id", QueryOperation::AnyValueInFeature, json!(["d1", "d2"])),
                Selection::condition("annotations.connected", QueryOperation::Equal, json!(false)),
            ]))
        );
    }

    #[test]
    fn test_single_state_leaf_is_unwrapped() {
        let sort = SortSpec::default();
        let page = Page::default();
        let planned = QueryBuilder::new(EntityKind::Device, "r", &sort, &page)
            .state(Some(LogState::Unknown))
            .build();

        let PlannedQuery::Query(msg) = planned else {
            panic!("expected a query");
        };
        assert_eq!(
            msg.find.unwrap().filter,
            Some(Selection::condition(
                "annotations.connected",
                QueryOperation::Equal,
                serde_json::Value::Null
            ))
        );
    }

    #[test]
    fn test_device_types_add_a_leaf() {
        let sort = SortSpec::default();
        let page = Page::default();
        let restriction = ids(&["d1", "d2"]);
        let types = ids(&["dt1"]);
        let planned = QueryBuilder::new(EntityKind::Device, "r", &sort, &page)
            .restrict_to(Some(&restriction))
            .device_types(Some(&types))
            .build();

        let PlannedQuery::Query(msg) = planned else {
            panic!("expected a query");
        };
        assert!(msg.list_ids.is_none());
        assert_eq!(
            msg.find.unwrap().filter,
            Some(Selection::And(vec![
                Selection::condition("id", QueryOperation::AnyValueInFeature, json!(["d1", "d2"])),
                Selection::condition(
                    "device_type_id",
                    QueryOperation::AnyValueInFeature,
                    json!(["dt1"])
                ),
            ]))
        );

        let none: Vec<String> = vec![];
        assert_eq!(
            QueryBuilder::new(EntityKind::Device, "r", &sort, &page)
                .device_types(Some(&none))
                .build(),
            PlannedQuery::Empty
        );
    }

    #[test]
    fn test_empty_restriction_and_zero_limit_short_circuit() {
        let sort = SortSpec::default();
        let page = Page::default();
        let empty: Vec<String> = vec![];
        assert_eq!(
            QueryBuilder::new(EntityKind::Device, "r", &sort, &page)
                .restrict_to(Some(&empty))
                .search(Some("foo"))
                .build(),
            PlannedQuery::Empty
        );

        let zero = Page::Offset {
            limit: 0,
            offset: 0,
        };
        assert_eq!(
            QueryBuilder::new(EntityKind::Hub, "r", &sort, &zero).build(),
            PlannedQuery::Empty
        );
    }
}
