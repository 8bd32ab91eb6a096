//! Process engine and process deployment clients

use aggr_core::{AggregatorResult, Dependencies, ProcessBackend, Token};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{instrument, warn};

use crate::error::Result;
use crate::http::{BackendConfig, HttpBackend};

/// Deployment listing comes from the process engine wrapper, dependency
/// graphs from the process deployment service.
#[derive(Debug, Clone)]
pub struct ProcessClient {
    engine: HttpBackend,
    deployment: HttpBackend,
}

impl ProcessClient {
    pub fn new(engine: &BackendConfig, deployment: &BackendConfig) -> Result<Self> {
        Ok(Self {
            engine: HttpBackend::new("process-engine", engine)?,
            deployment: HttpBackend::new("process-deployment", deployment)?,
        })
    }

    async fn fetch_deployments(
        &self,
        token: &Token,
        params: &[(String, String)],
    ) -> Result<Vec<Map<String, Value>>> {
        let mut url = self.engine.endpoint(&["deployment"])?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        let deployments: Option<Vec<Map<String, Value>>> =
            self.engine.get_json(token, url).await?;
        Ok(deployments.unwrap_or_default())
    }

    async fn fetch_dependencies(&self, token: &Token, ids: &[String]) -> Result<Vec<Dependencies>> {
        let mut url = self.deployment.endpoint(&["dependencies"])?;
        url.query_pairs_mut().append_pair("ids", &ids.join(","));
        let dependencies: Option<Vec<Dependencies>> = self.deployment.get_json(token, url).await?;
        Ok(dependencies.unwrap_or_default())
    }
}

#[async_trait]
impl ProcessBackend for ProcessClient {
    #[instrument(skip(self, token))]
    async fn list_deployments(
        &self,
        token: &Token,
        params: &[(String, String)],
    ) -> AggregatorResult<Vec<Map<String, Value>>> {
        if !self.engine.is_enabled() {
            warn!("no process-engine url configured");
            return Ok(Vec::new());
        }
        self.fetch_deployments(token, params)
            .await
            .map_err(|e| e.into_aggregator(self.engine.name()))
    }

    #[instrument(skip(self, token, deployment_ids), fields(count = deployment_ids.len()))]
    async fn dependencies(
        &self,
        token: &Token,
        deployment_ids: &[String],
    ) -> AggregatorResult<Vec<Dependencies>> {
        if !self.deployment.is_enabled() {
            warn!("no process-deployment url configured");
            return Ok(Vec::new());
        }
        if deployment_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_dependencies(token, deployment_ids)
            .await
            .map_err(|e| e.into_aggregator(self.deployment.name()))
    }
}
