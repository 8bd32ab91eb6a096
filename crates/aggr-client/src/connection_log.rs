//! Connection-log client (state, history and edges)

use std::collections::HashMap;

use aggr_core::{AggregatorResult, ConnectionLogBackend, EntityKind, HistorySeries, Token};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::error::Result;
use crate::http::{BackendConfig, HttpBackend};

/// One result block of `/intern/history`
#[derive(Debug, Default, Deserialize)]
struct HistoryResult {
    #[serde(rename = "Series", default)]
    series: Option<Vec<HistorySeries>>,
}

#[derive(Debug, Clone)]
pub struct ConnectionLogClient {
    http: HttpBackend,
}

impl ConnectionLogClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            http: HttpBackend::new("connection-log", config)?,
        })
    }

    async fn fetch_states(
        &self,
        token: &Token,
        kind: EntityKind,
        ids: &[String],
    ) -> Result<HashMap<String, bool>> {
        let url = self
            .http
            .endpoint(&["intern", "state", kind.log_kind(), "check"])?;
        self.http.post_json(token, url, ids).await
    }

    async fn fetch_history(
        &self,
        token: &Token,
        kind: EntityKind,
        ids: &[String],
        duration: &str,
    ) -> Result<HashMap<String, HistorySeries>> {
        let url = self
            .http
            .endpoint(&["intern", "history", kind.log_kind(), duration])?;
        let results: Option<Vec<HistoryResult>> = self.http.post_json(token, url, ids).await?;

        let series = results
            .and_then(|r| r.into_iter().next())
            .and_then(|r| r.series)
            .unwrap_or_default();

        Ok(series
            .into_iter()
            .filter_map(|s| {
                let id = s.tags.get(kind.log_kind())?.clone();
                Some((id, s))
            })
            .collect())
    }

    async fn fetch_edges(
        &self,
        token: &Token,
        kind: EntityKind,
        ids: &[String],
        duration: &str,
    ) -> Result<HashMap<String, Value>> {
        let url = self
            .http
            .endpoint(&["intern", "logedge", kind.log_kind(), duration])?;
        let edges: Option<HashMap<String, Value>> = self.http.post_json(token, url, ids).await?;
        Ok(edges.unwrap_or_default())
    }
}

#[async_trait]
impl ConnectionLogBackend for ConnectionLogClient {
    #[instrument(skip(self, token, ids), fields(count = ids.len()))]
    async fn check_states(
        &self,
        token: &Token,
        kind: EntityKind,
        ids: &[String],
    ) -> AggregatorResult<HashMap<String, bool>> {
        if !self.http.is_enabled() {
            warn!(%kind, "no connection-log url configured");
            return Ok(match kind {
                EntityKind::Device => HashMap::new(),
                EntityKind::Hub => ids.iter().map(|id| (id.clone(), true)).collect(),
            });
        }
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.fetch_states(token, kind, ids)
            .await
            .map_err(|e| e.into_aggregator(self.http.name()))
    }

    #[instrument(skip(self, token, ids), fields(count = ids.len()))]
    async fn history(
        &self,
        token: &Token,
        kind: EntityKind,
        ids: &[String],
        duration: &str,
    ) -> AggregatorResult<HashMap<String, HistorySeries>> {
        if !self.http.is_enabled() {
            warn!(%kind, "no connection-log url configured");
            return Ok(HashMap::new());
        }
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.fetch_history(token, kind, ids, duration)
            .await
            .map_err(|e| e.into_aggregator(self.http.name()))
    }

    #[instrument(skip(self, token, ids), fields(count = ids.len()))]
    async fn edges(
        &self,
        token: &Token,
        kind: EntityKind,
        ids: &[String],
        duration: &str,
    ) -> AggregatorResult<HashMap<String, Value>> {
        if !self.http.is_enabled() {
            warn!(%kind, "no connection-log url configured");
            return Ok(HashMap::new());
        }
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.fetch_edges(token, kind, ids, duration)
            .await
            .map_err(|e| e.into_aggregator(self.http.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled() -> ConnectionLogClient {
        ConnectionLogClient::new(&BackendConfig::new("-")).unwrap()
    }

    #[tokio::test]
    async fn test_disabled_device_states_are_unknown() {
        let states = disabled()
            .check_states(&Token::new("t"), EntityKind::Device, &["d1".to_string()])
            .await
            .unwrap();
        assert!(states.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_hub_states_are_connected() {
        let states = disabled()
            .check_states(
                &Token::new("t"),
                EntityKind::Hub,
                &["h1".to_string(), "h2".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(states.len(), 2);
        assert!(states.values().all(|online| *online));
    }

    #[tokio::test]
    async fn test_disabled_history_is_empty() {
        let client = disabled();
        let token = Token::new("t");
        let ids = vec!["d1".to_string()];
        assert!(client
            .history(&token, EntityKind::Device, &ids, "1h")
            .await
            .unwrap()
            .is_empty());
        assert!(client
            .edges(&token, EntityKind::Device, &ids, "1h")
            .await
            .unwrap()
            .is_empty());
    }
}
