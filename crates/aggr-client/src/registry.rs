//! Device-type, location and hub membership lookups

use aggr_core::{
    AggregatorResult, Location, QueryListCommons, QueryListIds, QueryMessage, RegistryBackend,
    Token,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::error::Result;
use crate::http::{BackendConfig, HttpBackend};
use crate::search::{self, SearchClient};

const DEVICE_REPO: &str = "device-repository";

/// Device types and locations come from the permission search index, hub
/// membership from the device repository.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    search: SearchClient,
    device_repo: HttpBackend,
    rights: String,
}

impl RegistryClient {
    pub fn new(search: SearchClient, device_repo: &BackendConfig) -> Result<Self> {
        Ok(Self {
            search,
            device_repo: HttpBackend::new(DEVICE_REPO, device_repo)?,
            rights: "r".to_string(),
        })
    }

    fn select_ids(&self, resource: &str, ids: &[String]) -> QueryMessage {
        QueryMessage::list_ids(
            resource,
            QueryListIds {
                commons: QueryListCommons {
                    limit: ids.len(),
                    rights: self.rights.clone(),
                    ..Default::default()
                },
                ids: ids.to_vec(),
            },
        )
    }
}

#[async_trait]
impl RegistryBackend for RegistryClient {
    #[instrument(skip(self, token, ids), fields(count = ids.len()))]
    async fn list_device_types(
        &self,
        token: &Token,
        ids: &[String],
    ) -> AggregatorResult<Vec<Map<String, Value>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.search
            .query_list(token, &self.select_ids("device-types", ids))
            .await
            .map_err(|e| e.into_aggregator(search::BACKEND_NAME))
    }

    #[instrument(skip(self, token, ids), fields(count = ids.len()))]
    async fn list_locations(
        &self,
        token: &Token,
        ids: &[String],
    ) -> AggregatorResult<Vec<Location>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.search
            .query_list(token, &self.select_ids("locations", ids))
            .await
            .map_err(|e| e.into_aggregator(search::BACKEND_NAME))
    }

    #[instrument(skip(self, token))]
    async fn hub_device_ids(&self, token: &Token, hub_id: &str) -> AggregatorResult<Vec<String>> {
        let fetch = async {
            let mut url = self.device_repo.endpoint(&["hubs", hub_id, "devices"])?;
            url.query_pairs_mut().append_pair("as", "id");
            self.device_repo.get_json::<Option<Vec<String>>>(token, url).await
        };
        fetch
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| e.into_aggregator(DEVICE_REPO))
    }
}
