//! Event manager client

use std::collections::HashMap;

use aggr_core::{AggregatorResult, EventStateBackend, Token};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument, warn};

use crate::error::{ClientError, Result};
use crate::http::{extract_error_from_status, BackendConfig, HttpBackend};

#[derive(Debug, Clone)]
pub struct EventStateClient {
    http: HttpBackend,
}

impl EventStateClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            http: HttpBackend::new("event-manager", config)?,
        })
    }

    async fn fetch_states(&self, token: &Token, ids: &[String]) -> Result<HashMap<String, bool>> {
        let mut url = self.http.endpoint(&["event-states"])?;
        url.query_pairs_mut().append_pair("ids", &ids.join(","));

        let response = self.http.get_raw(token, url).await?;
        let status = response.status();

        if status.is_server_error() {
            return Err(extract_error_from_status(response, status).await);
        }
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), %body, "event pipeline not ready");
            return Ok(HashMap::new());
        }

        let states: Option<HashMap<String, bool>> = response
            .json()
            .await
            .map_err(ClientError::body)?;
        Ok(states.unwrap_or_default())
    }
}

#[async_trait]
impl EventStateBackend for EventStateClient {
    #[instrument(skip(self, token, ids), fields(count = ids.len()))]
    async fn check_event_states(
        &self,
        token: &Token,
        ids: &[String],
    ) -> AggregatorResult<HashMap<String, bool>> {
        if !self.http.is_enabled() {
            warn!("no event-manager url configured");
            return Ok(HashMap::new());
        }
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.fetch_states(token, ids)
            .await
            .map_err(|e| e.into_aggregator(self.http.name()))
    }
}
