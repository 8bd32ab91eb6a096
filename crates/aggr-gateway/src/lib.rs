//! aggr-gateway - Query composition and cross-service joins
//!
//! This crate turns a caller's listing request into one search-index query,
//! runs it, and joins the result with data owned by the other services.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Aggregator                              │
//! │                                                                  │
//! │  QueryBuilder ──► SearchBackend ──► Enrichment ──► response      │
//! │  (filters,        (one page or       (log_state, device_type,    │
//! │   paging)          find_all walk)     history, edges)            │
//! │                                                                  │
//! │  ProcessBackend ──► set_online_state ──► online/offline_reasons  │
//! │                     (ConnectionLog + EventState, fail-open)      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use aggr_gateway::{Aggregator, AggregatorOptions, Backends};
//!
//! let aggregator = Aggregator::new(backends, AggregatorOptions::default());
//! let devices = aggregator.list_devices(&token, &DeviceQuery::default()).await?;
//! ```

mod aggregator;
pub mod enrich;
pub mod liveness;
pub mod pagination;
pub mod query;

#[cfg(test)]
mod testing;

pub use aggregator::{Aggregator, AggregatorOptions, Backends};
pub use enrich::Enrichment;
pub use pagination::{find_all, PageParams, DEFAULT_FIND_ALL_BATCH};
pub use query::{resolve_restriction, PlannedQuery, QueryBuilder};

// Re-export core types for convenience
pub use aggr_core::{AggregatorError, AggregatorResult, Token};
