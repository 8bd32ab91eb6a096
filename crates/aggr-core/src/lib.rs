//! aggr-core - Core traits and types for the query aggregator
//!
//! This crate provides the entity and query models, the error taxonomy and the
//! backend traits that the client crate implements and the gateway composes.

pub mod backend;
pub mod error;
pub mod models;

pub use backend::{
    ConnectionLogBackend, EventStateBackend, ProcessBackend, RegistryBackend, SearchBackend, Token,
};
pub use error::{AggregatorError, AggregatorResult};
pub use models::*;
