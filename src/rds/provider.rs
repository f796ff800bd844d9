//! Dynamically fetched route configuration.
//!
//! # Responsibilities
//! - Drive the periodic fetch loop for one (cluster, route_config_name)
//! - Deduplicate payloads by content hash
//! - Publish new configurations with a single atomic swap
//! - Release init targets after the first attempt
//!
//! # Design Decisions
//! - One tokio task per provider; dropping the provider aborts it, which
//!   cancels an in-flight fetch and the pending sleep
//! - Configuration and version info are published together in one
//!   snapshot so readers never see a mismatched pair
//! - Fixed refresh interval, no backoff

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::route::RouteConfigurationDoc;
use crate::config::{NodeConfig, RdsConfig};
use crate::lifecycle::InitTarget;
use crate::rds::manager::{Registry, RegistryKey, RouteTableDump};
use crate::rds::stats::{RdsCounter, RdsStats};
use crate::rds::subscription::{fetch_path, parse_resources, RouteFetcher};
use crate::rds::{RdsError, RouteConfigProvider};
use crate::routing::policy::hash64;
use crate::routing::RouteConfiguration;
use crate::runtime::Loader;
use crate::upstream::ClusterManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ProviderState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    RefreshInFlight = 3,
    Destroyed = 4,
}

impl ProviderState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ProviderState::Uninitialized,
            1 => ProviderState::Initializing,
            2 => ProviderState::Ready,
            3 => ProviderState::RefreshInFlight,
            _ => ProviderState::Destroyed,
        }
    }
}

/// What readers see: a configuration and the hash it was built from.
struct Snapshot {
    config: Arc<RouteConfiguration>,
    hash: Option<u64>,
}

impl Snapshot {
    fn version_info(&self) -> String {
        self.hash
            .map(|hash| format!("hash_{:016x}", hash))
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct InitGate {
    initialized: bool,
    pending: Vec<InitTarget>,
}

/// State shared between the provider handle and its fetch task.
struct Shared {
    route_config_name: String,
    cluster_name: String,
    fetch_path: String,
    refresh_delay: Duration,
    runtime: Arc<dyn Loader>,
    cm: Arc<dyn ClusterManager>,
    snapshot: ArcSwap<Snapshot>,
    state: AtomicU8,
    stats: RdsStats,
    init: Mutex<InitGate>,
}

impl Shared {
    fn set_state(&self, state: ProviderState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn is_initialized(&self) -> bool {
        self.init
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .initialized
    }

    /// Fire every pending init target. Only the first call has an effect.
    fn finish_init(&self) {
        let pending = {
            let mut gate = self.init.lock().unwrap_or_else(PoisonError::into_inner);
            if gate.initialized {
                return;
            }
            gate.initialized = true;
            std::mem::take(&mut gate.pending)
        };
        tracing::debug!(route_config_name = %self.route_config_name, "rds: initialized");
        for target in pending {
            target.ready();
        }
    }

    fn on_config_update(&self, mut docs: Vec<RouteConfigurationDoc>) -> Result<(), RdsError> {
        if docs.is_empty() {
            tracing::debug!(
                route_config_name = %self.route_config_name,
                "rds: empty update, keeping current configuration"
            );
            self.stats.inc(RdsCounter::UpdateEmpty);
            self.finish_init();
            return Ok(());
        }
        if docs.len() != 1 {
            return Err(RdsError::UnexpectedResourceLength(docs.len()));
        }

        let mut doc = docs.remove(0);
        if doc.name.is_empty() {
            doc.name = self.route_config_name.clone();
        }

        let canonical = serde_json::to_vec(&doc).map_err(RdsError::Serialize)?;
        let hash = hash64(&canonical);
        if self.snapshot.load().hash == Some(hash) {
            tracing::debug!(
                route_config_name = %self.route_config_name,
                "rds: configuration unchanged"
            );
            self.finish_init();
            return Ok(());
        }

        // Clusters may legitimately appear after the routes that use them.
        let config = RouteConfiguration::build(doc, self.runtime.clone(), self.cm.as_ref(), false)?;
        self.snapshot.store(Arc::new(Snapshot {
            config: Arc::new(config),
            hash: Some(hash),
        }));
        self.stats.inc(RdsCounter::ConfigReload);
        tracing::info!(
            route_config_name = %self.route_config_name,
            version_info = %format!("hash_{:016x}", hash),
            "rds: loaded new route configuration"
        );
        self.finish_init();
        Ok(())
    }

    async fn refresh(&self, fetcher: &dyn RouteFetcher) {
        self.set_state(if self.is_initialized() {
            ProviderState::RefreshInFlight
        } else {
            ProviderState::Initializing
        });
        self.stats.inc(RdsCounter::UpdateAttempt);

        let result = match fetcher.fetch(&self.cluster_name, &self.fetch_path).await {
            Ok(body) => parse_resources(&body)
                .map_err(RdsError::from)
                .and_then(|docs| self.on_config_update(docs)),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => self.stats.inc(RdsCounter::UpdateSuccess),
            Err(e) => {
                tracing::warn!(
                    route_config_name = %self.route_config_name,
                    cluster = %self.cluster_name,
                    error = %e,
                    "rds: update failed, keeping current configuration"
                );
                self.stats.inc(RdsCounter::UpdateFailure);
            }
        }

        // The first attempt releases startup whatever its outcome.
        self.finish_init();
        self.set_state(ProviderState::Ready);
    }
}

async fn run(shared: Arc<Shared>, fetcher: Arc<dyn RouteFetcher>) {
    loop {
        shared.refresh(fetcher.as_ref()).await;
        tokio::time::sleep(shared.refresh_delay).await;
    }
}

/// Handle to a dynamically fetched route configuration.
///
/// Obtained from [`RouteConfigProviderManager`](crate::rds::RouteConfigProviderManager),
/// which shares one provider between every requester of the same source.
pub struct RdsRouteConfigProvider {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
    registry: Weak<Registry>,
    key: RegistryKey,
}

impl RdsRouteConfigProvider {
    /// Validate the source, publish an empty configuration and start the
    /// fetch loop. Must be called within a tokio runtime.
    pub(crate) fn start(
        rds: &RdsConfig,
        stat_prefix: &str,
        local: &NodeConfig,
        runtime: Arc<dyn Loader>,
        cm: Arc<dyn ClusterManager>,
        fetcher: Arc<dyn RouteFetcher>,
        registry: Weak<Registry>,
    ) -> Result<Self, RdsError> {
        if local.cluster.is_empty() || local.node.is_empty() {
            return Err(RdsError::MissingLocalNode);
        }
        if !cm.has_cluster(&rds.cluster) {
            return Err(RdsError::UnknownCluster(rds.cluster.clone()));
        }

        let shared = Arc::new(Shared {
            route_config_name: rds.route_config_name.clone(),
            cluster_name: rds.cluster.clone(),
            fetch_path: fetch_path(&rds.route_config_name, &local.cluster, &local.node),
            refresh_delay: Duration::from_millis(rds.refresh_delay_ms),
            snapshot: ArcSwap::from_pointee(Snapshot {
                config: Arc::new(RouteConfiguration::empty(runtime.clone())),
                hash: None,
            }),
            runtime,
            cm,
            state: AtomicU8::new(ProviderState::Uninitialized as u8),
            stats: RdsStats::new(stat_prefix),
            init: Mutex::new(InitGate::default()),
        });

        tracing::info!(
            route_config_name = %rds.route_config_name,
            cluster = %rds.cluster,
            refresh_delay_ms = rds.refresh_delay_ms,
            "rds: starting route configuration subscription"
        );
        let task = tokio::spawn(run(shared.clone(), fetcher));

        Ok(Self {
            shared,
            task,
            registry,
            key: (rds.cluster.clone(), rds.route_config_name.clone()),
        })
    }

    pub fn route_config_name(&self) -> &str {
        &self.shared.route_config_name
    }

    pub fn cluster_name(&self) -> &str {
        &self.shared.cluster_name
    }

    pub fn stats(&self) -> &RdsStats {
        &self.shared.stats
    }

    pub fn state(&self) -> ProviderState {
        ProviderState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.is_initialized()
    }

    /// Hold startup until the first update attempt completes. Fires
    /// immediately if that already happened.
    pub fn add_init_target(&self, target: InitTarget) {
        let mut gate = self.shared.init.lock().unwrap_or_else(PoisonError::into_inner);
        if gate.initialized {
            drop(gate);
            target.ready();
        } else {
            gate.pending.push(target);
        }
    }

    /// Apply a set of fetched resources.
    ///
    /// Zero resources is an empty update; more than one is an error. An
    /// unchanged payload is accepted without republishing.
    pub fn on_config_update(&self, docs: Vec<RouteConfigurationDoc>) -> Result<(), RdsError> {
        self.shared.on_config_update(docs)
    }

    /// Introspection view of the published configuration.
    pub fn dump(&self) -> RouteTableDump {
        let snapshot = self.shared.snapshot.load();
        let route_table_dump = match snapshot.hash {
            Some(_) => serde_json::to_value(snapshot.config.doc())
                .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
            None => serde_json::Value::Object(Default::default()),
        };
        RouteTableDump {
            version_info: snapshot.version_info(),
            route_config_name: self.shared.route_config_name.clone(),
            cluster_name: self.shared.cluster_name.clone(),
            route_table_dump,
        }
    }
}

impl RouteConfigProvider for RdsRouteConfigProvider {
    fn config(&self) -> Arc<RouteConfiguration> {
        self.shared.snapshot.load().config.clone()
    }

    fn version_info(&self) -> String {
        self.shared.snapshot.load().version_info()
    }
}

impl Drop for RdsRouteConfigProvider {
    fn drop(&mut self) {
        self.task.abort();
        self.shared.set_state(ProviderState::Destroyed);

        let pending = {
            let mut gate = self.shared.init.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut gate.pending)
        };
        drop(pending);

        if let Some(registry) = self.registry.upgrade() {
            registry.remove_if(&self.key, |_, weak| weak.strong_count() == 0);
        }
        tracing::debug!(
            route_config_name = %self.shared.route_config_name,
            cluster = %self.shared.cluster_name,
            "rds: provider destroyed"
        );
    }
}
