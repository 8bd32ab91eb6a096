//! Pagination Strategy - offset vs cursor pages and the exhaustive walk

use aggr_core::{
    AggregatorError, AggregatorResult, ListAfter, Page, QueryMessage, SearchBackend, Token,
    DEFAULT_LIMIT,
};
use serde_json::{Map, Value};
use tracing::debug;

/// Batch size of [`find_all`] when none is configured
pub const DEFAULT_FIND_ALL_BATCH: usize = 9999;

/// Raw page parameters as they arrive on the query string
#[derive(Debug, Clone, Copy, Default)]
pub struct PageParams<'a> {
    pub limit: Option<&'a str>,
    pub offset: Option<&'a str>,
    pub after_id: Option<&'a str>,
    pub after_sort_field_value: Option<&'a str>,
}

impl<'a> PageParams<'a> {
    /// True when no paging parameter was given at all
    pub fn is_empty(&self) -> bool {
        present(self.limit).is_none()
            && present(self.offset).is_none()
            && present(self.after_id).is_none()
    }

    /// Validate and select the page mode. `after.id` selects cursor mode and
    /// `offset` is then ignored.
    pub fn parse(&self) -> AggregatorResult<Page> {
        let limit = parse_count("limit", self.limit)?.unwrap_or(DEFAULT_LIMIT);

        if let Some(id) = present(self.after_id) {
            let raw_value = present(self.after_sort_field_value).ok_or_else(|| {
                AggregatorError::InvalidPageParameter(
                    "after.id requires after.sort_field_value".to_string(),
                )
            })?;
            return Ok(Page::Cursor {
                limit,
                after: ListAfter {
                    sort_field_value: parse_cursor_value(raw_value),
                    id: id.to_string(),
                },
            });
        }

        let offset = parse_count("offset", self.offset)?.unwrap_or(0);
        Ok(Page::Offset { limit, offset })
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_count(name: &str, raw: Option<&str>) -> AggregatorResult<Option<usize>> {
    match present(raw) {
        None => Ok(None),
        Some(raw) => raw.parse::<usize>().map(Some).map_err(|_| {
            AggregatorError::InvalidPageParameter(format!(
                "{} must be a non-negative integer, got '{}'",
                name, raw
            ))
        }),
    }
}

/// Decode `after.sort_field_value`: JSON if it parses, the plain string otherwise
pub fn parse_cursor_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Value of a (possibly dotted) field in a raw backend object
pub fn field_value(item: &Map<String, Value>, path: &str) -> Value {
    let mut parts = path.split('.');
    let Some(first) = parts.next() else {
        return Value::Null;
    };
    let mut current = match item.get(first) {
        Some(v) => v,
        None => return Value::Null,
    };
    for part in parts {
        current = match current.get(part) {
            Some(v) => v,
            None => return Value::Null,
        };
    }
    current.clone()
}

/// Collect every hit of a `find` query by walking cursor pages of
/// `batch_size` until a short batch comes back.
///
/// `list_ids` and other messages are sent once as given.
pub async fn find_all(
    search: &dyn SearchBackend,
    token: &Token,
    mut query: QueryMessage,
    batch_size: usize,
) -> AggregatorResult<Vec<Map<String, Value>>> {
    let batch_size = batch_size.max(1);
    if query.find.is_none() {
        return search.query(token, &query).await;
    }

    let mut result = Vec::new();
    let mut after: Option<ListAfter> = None;
    loop {
        let sort_by = match query.find.as_mut() {
            Some(find) => {
                find.commons.limit = batch_size;
                find.commons.offset = 0;
                find.commons.after = after.take();
                find.commons.sort_by.clone()
            }
            None => break,
        };

        let batch = search.query(token, &query).await?;
        let len = batch.len();
        debug!(resource = %query.resource, batch = len, total = result.len() + len, "find_all batch");

        if len == batch_size {
            if let Some(last) = batch.last() {
                let id = match last.get("id") {
                    Some(Value::String(id)) => id.clone(),
                    _ => {
                        return Err(AggregatorError::DataIntegrity(format!(
                            "unable to get {} id",
                            query.resource
                        )))
                    }
                };
                after = Some(ListAfter {
                    sort_field_value: field_value(last, &sort_by),
                    id,
                });
            }
        }

        result.extend(batch);
        if len < batch_size {
            break;
        }
    }
    Ok(result)
}
