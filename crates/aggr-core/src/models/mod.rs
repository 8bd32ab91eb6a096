//! Data models shared by the aggregation crates

use serde::{Deserialize, Deserializer};

mod entity;
mod process;
mod query;

pub use entity::*;
pub use process::*;
pub use query::*;

/// Upstream services send `null` for empty lists
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
