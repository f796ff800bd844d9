//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the runtime and cluster manager from the bootstrap file
//! - Create every configured route source
//! - Start route file watchers for file-backed static sources
//!
//! # Design Decisions
//! - Fail fast: an invalid static route table aborts startup
//! - Dynamic sources never fail startup on fetch errors; they only hold
//!   the init gate until their first attempt completes

use std::sync::Arc;

use notify::RecommendedWatcher;
use thiserror::Error;

use crate::config::watcher::RouteFileWatcher;
use crate::config::RouterConfig;
use crate::lifecycle::InitManager;
use crate::rds::{
    create_route_config_provider, HttpRouteFetcher, RdsError, RouteConfigProviderManager,
    RouteFetcher, RouteSource,
};
use crate::runtime::{Loader, RuntimeLoader};
use crate::upstream::{ClusterManager, StaticClusterManager};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("route source '{name}': {source}")]
    Source {
        name: String,
        #[source]
        source: RdsError,
    },

    #[error("failed to watch route file: {0}")]
    Watch(#[from] notify::Error),
}

/// A route source tagged with the name it is reported under.
pub struct NamedSource {
    pub name: String,
    pub source: RouteSource,
}

/// Everything the process keeps alive while running.
pub struct Bootstrap {
    pub runtime: Arc<RuntimeLoader>,
    pub cluster_manager: Arc<StaticClusterManager>,
    pub manager: Arc<RouteConfigProviderManager>,
    pub sources: Vec<NamedSource>,
    pub init: InitManager,
    watchers: Vec<RecommendedWatcher>,
}

impl Bootstrap {
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }
}

/// Build route sources from `config` using the HTTP fetcher.
pub fn bootstrap(config: &RouterConfig) -> Result<Bootstrap, StartupError> {
    let cluster_manager = Arc::new(StaticClusterManager::new(&config.clusters));
    let fetcher = Arc::new(HttpRouteFetcher::new(cluster_manager.clone()));
    bootstrap_with_fetcher(config, cluster_manager, fetcher)
}

/// Build route sources with a caller-supplied fetcher.
pub fn bootstrap_with_fetcher(
    config: &RouterConfig,
    cluster_manager: Arc<StaticClusterManager>,
    fetcher: Arc<dyn RouteFetcher>,
) -> Result<Bootstrap, StartupError> {
    let runtime = Arc::new(RuntimeLoader::with_overrides(&config.runtime.overrides));
    let loader: Arc<dyn Loader> = runtime.clone();
    let cm: Arc<dyn ClusterManager> = cluster_manager.clone();

    let manager = Arc::new(RouteConfigProviderManager::new(
        loader.clone(),
        cm.clone(),
        config.node.clone(),
        fetcher,
    ));
    let init = InitManager::new();

    let mut sources = Vec::with_capacity(config.route_sources.len());
    let mut watchers = Vec::new();
    for (index, source_config) in config.route_sources.iter().enumerate() {
        let name = if source_config.stat_prefix.is_empty() {
            format!("source_{}", index)
        } else {
            source_config.stat_prefix.trim_end_matches('.').to_string()
        };

        let source =
            create_route_config_provider(source_config, loader.clone(), cm.clone(), &manager, &init)
                .map_err(|source| StartupError::Source {
                    name: name.clone(),
                    source,
                })?;

        if let RouteSource::Static {
            provider,
            path: Some(path),
        } = &source
        {
            watchers.push(RouteFileWatcher::new(path, provider.clone()).run()?);
        }

        tracing::info!(source = %name, "Route source ready");
        sources.push(NamedSource { name, source });
    }

    Ok(Bootstrap {
        runtime,
        cluster_manager,
        manager,
        sources,
        init,
        watchers,
    })
}
