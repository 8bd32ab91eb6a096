//! Permission search client

use aggr_core::{AggregatorResult, QueryMessage, SearchBackend, Token};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::error::Result;
use crate::http::{BackendConfig, HttpBackend};

pub(crate) const BACKEND_NAME: &str = "permission-search";

/// Client for `POST {permission_search}/v3/query`
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: HttpBackend,
}

impl SearchClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            http: HttpBackend::new(BACKEND_NAME, config)?,
        })
    }

    /// Run a query message, decoding each hit as `T` (`null` reads as no hits)
    pub(crate) async fn query_list<T: DeserializeOwned>(
        &self,
        token: &Token,
        query: &QueryMessage,
    ) -> Result<Vec<T>> {
        let url = self.http.endpoint(&["v3", "query"])?;
        let hits: Option<Vec<T>> = self.http.post_json(token, url, query).await?;
        Ok(hits.unwrap_or_default())
    }
}

#[async_trait]
impl SearchBackend for SearchClient {
    #[instrument(skip(self, token, query), fields(resource = %query.resource))]
    async fn query(
        &self,
        token: &Token,
        query: &QueryMessage,
    ) -> AggregatorResult<Vec<Map<String, Value>>> {
        self.query_list(token, query)
            .await
            .map_err(|e| e.into_aggregator(self.http.name()))
    }
}
