//! Backend clients for the query aggregator
//!
//! Each client wraps one reqwest `Client` per backend and implements the
//! matching trait from `aggr_core::backend`. The inbound `Authorization`
//! value is forwarded on every call.
//!
//! # Example
//!
//! ```rust,no_run
//! use aggr_client::{BackendConfig, SearchClient};
//! use aggr_core::{QueryMessage, SearchBackend, Token};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let search = SearchClient::new(&BackendConfig::new("http://permission-search:8080"))?;
//! let hits = search
//!     .query(&Token::new("Bearer ..."), &QueryMessage::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! The `testing` module starts mock backends in-process:
//!
//! ```rust,ignore
//! use aggr_client::testing::TestServer;
//!
//! let server = TestServer::start(router).await?;
//! let client = ConnectionLogClient::new(&server.backend_config())?;
//! ```

mod connection_log;
mod error;
mod event_state;
mod http;
mod process;
mod registry;
mod search;
pub mod testing;

pub use connection_log::ConnectionLogClient;
pub use error::{ClientError, Result};
pub use event_state::EventStateClient;
pub use http::{BackendConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT};
pub use process::ProcessClient;
pub use registry::RegistryClient;
pub use search::SearchClient;
