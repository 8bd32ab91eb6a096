//! Aggregator - composes query building, pagination, enrichment and
//! liveness per endpoint

use std::collections::HashMap;
use std::sync::Arc;

use aggr_core::{
    AggregatorResult, ConnectionLogBackend, DeviceQuery, EntityKind, EntityRecord,
    EventStateBackend, HubDeviceQuery, HubQuery, Page, ProcessBackend, ProcessRecord,
    RegistryBackend, SearchBackend, Token,
};
use tracing::{debug, info};

use crate::enrich::Enrichment;
use crate::liveness;
use crate::pagination::{self, DEFAULT_FIND_ALL_BATCH};
use crate::query::{resolve_restriction, PlannedQuery, QueryBuilder};

/// The services the aggregator composes
#[derive(Clone)]
pub struct Backends {
    pub search: Arc<dyn SearchBackend>,
    pub registry: Arc<dyn RegistryBackend>,
    pub connection_log: Arc<dyn ConnectionLogBackend>,
    pub processes: Arc<dyn ProcessBackend>,
    pub events: Arc<dyn EventStateBackend>,
}

/// Behavior switches, fixed at startup
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Treat a failing liveness source as "everything live"
    pub fail_open_liveness: bool,
    /// Page size of the exhaustive device and hub walks
    pub find_all_batch_size: usize,
    /// Permission right required on listed resources
    pub rights: String,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            fail_open_liveness: true,
            find_all_batch_size: DEFAULT_FIND_ALL_BATCH,
            rights: "r".to_string(),
        }
    }
}

pub struct Aggregator {
    backends: Backends,
    enrichment: Enrichment,
    options: AggregatorOptions,
}

impl Aggregator {
    pub fn new(backends: Backends, options: AggregatorOptions) -> Self {
        let enrichment = Enrichment::new(
            Arc::clone(&backends.registry),
            Arc::clone(&backends.connection_log),
        );
        info!(
            fail_open_liveness = options.fail_open_liveness,
            find_all_batch_size = options.find_all_batch_size,
            "Aggregator ready"
        );
        Self {
            backends,
            enrichment,
            options,
        }
    }

    pub fn options(&self) -> &AggregatorOptions {
        &self.options
    }

    pub fn enrichment(&self) -> &Enrichment {
        &self.enrichment
    }

    async fn run(
        &self,
        token: &Token,
        kind: EntityKind,
        planned: PlannedQuery,
    ) -> AggregatorResult<Vec<EntityRecord>> {
        match planned {
            PlannedQuery::Empty => {
                debug!(%kind, "Empty result, skipping search");
                Ok(Vec::new())
            }
            PlannedQuery::Query(message) => {
                let hits = self.backends.search.query(token, &message).await?;
                EntityRecord::from_raw_list(kind, hits)
            }
        }
    }

    /// Like `run`, but a `find` is walked to the end in batches
    async fn run_all(
        &self,
        token: &Token,
        kind: EntityKind,
        planned: PlannedQuery,
    ) -> AggregatorResult<Vec<EntityRecord>> {
        match planned {
            PlannedQuery::Empty => Ok(Vec::new()),
            PlannedQuery::Query(message) => {
                let hits = pagination::find_all(
                    self.backends.search.as_ref(),
                    token,
                    message,
                    self.options.find_all_batch_size,
                )
                .await?;
                EntityRecord::from_raw_list(kind, hits)
            }
        }
    }

    /// Page of an exhaustive listing; a `list_ids` covers the whole restriction
    fn walk_page(&self, restriction: Option<&[String]>) -> Page {
        Page::Offset {
            limit: restriction.map_or(self.options.find_all_batch_size.max(1), <[String]>::len),
            offset: 0,
        }
    }

    // =========================================================================
    // Devices
    // =========================================================================

    /// Primary device page, without enrichment; `page == None` lists every
    /// matching device
    pub async fn find_devices(
        &self,
        token: &Token,
        query: &DeviceQuery,
    ) -> AggregatorResult<Vec<EntityRecord>> {
        let kind = EntityKind::Device;
        if query.page.as_ref().is_some_and(|page| page.limit() == 0) {
            return Ok(Vec::new());
        }

        let restriction = resolve_restriction(
            self.backends.registry.as_ref(),
            token,
            query.ids.as_deref(),
            query.location.as_deref(),
        )
        .await?;

        let walk = self.walk_page(restriction.as_deref());
        let page = query.page.as_ref().unwrap_or(&walk);
        let planned = QueryBuilder::new(kind, &self.options.rights, &query.sort, page)
            .search(query.search.as_deref())
            .restrict_to(restriction.as_deref())
            .device_types(query.device_types.as_deref())
            .state(query.state)
            .build();

        match query.page {
            Some(_) => self.run(token, kind, planned).await,
            None => self.run_all(token, kind, planned).await,
        }
    }

    /// `GET /devices`: query, then state filter or completion, then history
    pub async fn list_devices(
        &self,
        token: &Token,
        query: &DeviceQuery,
    ) -> AggregatorResult<Vec<EntityRecord>> {
        let kind = EntityKind::Device;
        let devices = self.find_devices(token, query).await?;

        let devices = match query.state {
            Some(state) => {
                self.enrichment
                    .filter_by_state(token, kind, devices, state)
                    .await?
            }
            None => self.enrichment.complete_list(token, kind, devices).await?,
        };

        match query.log.as_deref() {
            Some(duration) => {
                self.enrichment
                    .attach_history(token, kind, devices, duration)
                    .await
            }
            None => Ok(devices),
        }
    }

    // =========================================================================
    // Hubs
    // =========================================================================

    /// Primary hub list; `page == None` walks the whole index
    pub async fn find_hubs(
        &self,
        token: &Token,
        query: &HubQuery,
    ) -> AggregatorResult<Vec<EntityRecord>> {
        let kind = EntityKind::Hub;
        let walk = self.walk_page(None);
        let page = query.page.as_ref().unwrap_or(&walk);
        let planned = QueryBuilder::new(kind, &self.options.rights, &query.sort, page)
            .search(query.search.as_deref())
            .build();

        match query.page {
            Some(_) => self.run(token, kind, planned).await,
            None => self.run_all(token, kind, planned).await,
        }
    }

    /// `GET /hubs`: query, completion, then history
    pub async fn list_hubs(
        &self,
        token: &Token,
        query: &HubQuery,
    ) -> AggregatorResult<Vec<EntityRecord>> {
        let kind = EntityKind::Hub;
        let hubs = self.find_hubs(token, query).await?;
        let hubs = self.enrichment.complete_list(token, kind, hubs).await?;
        match query.log.as_deref() {
            Some(duration) => {
                self.enrichment
                    .attach_history(token, kind, hubs, duration)
                    .await
            }
            None => Ok(hubs),
        }
    }

    /// `GET /hubs/{id}/devices`
    pub async fn hub_devices(
        &self,
        token: &Token,
        hub_id: &str,
        query: &HubDeviceQuery,
    ) -> AggregatorResult<Vec<EntityRecord>> {
        let kind = EntityKind::Device;
        let ids = self.backends.registry.hub_device_ids(token, hub_id).await?;
        debug!(hub_id, devices = ids.len(), "Resolved hub devices");

        let page = query.page.clone().unwrap_or(Page::Offset {
            limit: ids.len(),
            offset: 0,
        });
        let planned = QueryBuilder::new(kind, &self.options.rights, &query.sort, &page)
            .restrict_to(Some(&ids))
            .build();
        let devices = self.run(token, kind, planned).await?;

        match query.state {
            Some(state) => {
                self.enrichment
                    .filter_by_state(token, kind, devices, state)
                    .await
            }
            None => self.enrichment.complete_list(token, kind, devices).await,
        }
    }

    // =========================================================================
    // Processes
    // =========================================================================

    /// `GET /processes`: deployment listing plus `online`/`offline_reasons`
    pub async fn list_processes(
        &self,
        token: &Token,
        params: &[(String, String)],
    ) -> AggregatorResult<Vec<ProcessRecord>> {
        let raw = self.backends.processes.list_deployments(token, params).await?;
        let mut processes = raw
            .into_iter()
            .map(ProcessRecord::from_raw)
            .collect::<AggregatorResult<Vec<_>>>()?;
        if processes.is_empty() {
            return Ok(processes);
        }

        let ids: Vec<String> = processes.iter().map(|p| p.id.clone()).collect();
        let dependencies = self.backends.processes.dependencies(token, &ids).await?;
        let dependencies = liveness::set_online_state(
            self.backends.connection_log.as_ref(),
            self.backends.events.as_ref(),
            token,
            dependencies,
            self.options.fail_open_liveness,
        )
        .await?;

        let index: HashMap<&str, _> = dependencies
            .iter()
            .map(|d| (d.deployment_id.as_str(), d))
            .collect();

        for process in processes.iter_mut() {
            match index.get(process.id.as_str()) {
                Some(graph) if !graph.online => {
                    process.online = false;
                    process.offline_reasons = graph.offline_reasons();
                }
                _ => {
                    process.online = true;
                    process.offline_reasons = Vec::new();
                }
            }
        }
        Ok(processes)
    }
}
