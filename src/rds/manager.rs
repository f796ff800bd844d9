//! Shared registry of dynamic route configuration providers.
//!
//! # Responsibilities
//! - Hand out one provider per (collector cluster, route_config_name)
//! - Forget providers once their last handle is dropped
//! - Render the `/routes` introspection dump

use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::config::{NodeConfig, RdsConfig};
use crate::lifecycle::InitManager;
use crate::rds::provider::RdsRouteConfigProvider;
use crate::rds::subscription::RouteFetcher;
use crate::rds::RdsError;
use crate::runtime::Loader;
use crate::upstream::ClusterManager;

/// (collector cluster, route_config_name)
pub(crate) type RegistryKey = (String, String);

pub(crate) type Registry = DashMap<RegistryKey, Weak<RdsRouteConfigProvider>>;

/// One entry of the `/routes` dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteTableDump {
    pub version_info: String,
    pub route_config_name: String,
    pub cluster_name: String,
    pub route_table_dump: serde_json::Value,
}

/// Returned by [`RouteConfigProviderManager::dump_routes`] for unsupported
/// query parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutesUsage {
    pub general_usage: &'static str,
    pub specify_name_usage: &'static str,
}

impl Default for RoutesUsage {
    fn default() -> Self {
        Self {
            general_usage: "/routes (dump all dynamic HTTP route tables).",
            specify_name_usage: "/routes?route_config_name=<name> (dump all dynamic HTTP route tables with the <name> if any).",
        }
    }
}

pub struct RouteConfigProviderManager {
    registry: Arc<Registry>,
    runtime: Arc<dyn Loader>,
    cm: Arc<dyn ClusterManager>,
    local: NodeConfig,
    fetcher: Arc<dyn RouteFetcher>,
}

impl RouteConfigProviderManager {
    pub fn new(
        runtime: Arc<dyn Loader>,
        cm: Arc<dyn ClusterManager>,
        local: NodeConfig,
        fetcher: Arc<dyn RouteFetcher>,
    ) -> Self {
        Self {
            registry: Arc::new(DashMap::new()),
            runtime,
            cm,
            local,
            fetcher,
        }
    }

    /// Return the live provider for `rds`, creating it if needed.
    ///
    /// Every call registers an init target with `init` that fires once the
    /// provider has made its first update attempt.
    pub fn get_route_config_provider(
        &self,
        rds: &RdsConfig,
        stat_prefix: &str,
        init: &InitManager,
    ) -> Result<Arc<RdsRouteConfigProvider>, RdsError> {
        let key = (rds.cluster.clone(), rds.route_config_name.clone());
        let provider = match self.registry.entry(key) {
            Entry::Occupied(mut entry) => match entry.get().upgrade() {
                Some(existing) => existing,
                None => {
                    let created = Arc::new(self.start(rds, stat_prefix)?);
                    entry.insert(Arc::downgrade(&created));
                    created
                }
            },
            Entry::Vacant(entry) => {
                let created = Arc::new(self.start(rds, stat_prefix)?);
                entry.insert(Arc::downgrade(&created));
                created
            }
        };

        provider.add_init_target(init.register(format!("rds:{}", rds.route_config_name)));
        Ok(provider)
    }

    fn start(&self, rds: &RdsConfig, stat_prefix: &str) -> Result<RdsRouteConfigProvider, RdsError> {
        RdsRouteConfigProvider::start(
            rds,
            stat_prefix,
            &self.local,
            self.runtime.clone(),
            self.cm.clone(),
            self.fetcher.clone(),
            Arc::downgrade(&self.registry),
        )
    }

    /// Live providers ordered by (cluster, route_config_name).
    pub fn rds_route_config_providers(&self) -> Vec<Arc<RdsRouteConfigProvider>> {
        let mut live: Vec<(RegistryKey, Arc<RdsRouteConfigProvider>)> = self
            .registry
            .iter()
            .filter_map(|entry| entry.value().upgrade().map(|p| (entry.key().clone(), p)))
            .collect();
        live.sort_by(|a, b| a.0.cmp(&b.0));
        live.into_iter().map(|(_, provider)| provider).collect()
    }

    /// Dump dynamic route tables.
    ///
    /// No parameters dumps every table; a single `route_config_name`
    /// parameter filters by name. Anything else yields the usage text.
    pub fn dump_routes(&self, params: &[(String, String)]) -> Result<Vec<RouteTableDump>, RoutesUsage> {
        let name = match params {
            [] => None,
            [(key, value)] if key == "route_config_name" => Some(value.as_str()),
            _ => return Err(RoutesUsage::default()),
        };

        Ok(self
            .rds_route_config_providers()
            .iter()
            .filter(|p| name.map_or(true, |n| p.route_config_name() == n))
            .map(|p| p.dump())
            .collect())
    }
}
