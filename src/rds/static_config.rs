//! Route configuration given in the bootstrap or a local file.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::route::RouteConfigurationDoc;
use crate::rds::RouteConfigProvider;
use crate::routing::{RouteConfiguration, RouteResult};
use crate::runtime::Loader;
use crate::upstream::ClusterManager;

/// Provider for a locally defined configuration.
///
/// The configuration is built eagerly so that an invalid table fails
/// startup. `reload` swaps in a rebuilt table and keeps the old one on error.
pub struct StaticRouteConfigProvider {
    config: ArcSwap<RouteConfiguration>,
    runtime: Arc<dyn Loader>,
    cm: Arc<dyn ClusterManager>,
    validate_clusters: bool,
}

impl StaticRouteConfigProvider {
    pub fn new(
        doc: RouteConfigurationDoc,
        runtime: Arc<dyn Loader>,
        cm: Arc<dyn ClusterManager>,
        validate_clusters: bool,
    ) -> RouteResult<Self> {
        let config = RouteConfiguration::build(doc, runtime.clone(), cm.as_ref(), validate_clusters)?;
        Ok(Self {
            config: ArcSwap::from_pointee(config),
            runtime,
            cm,
            validate_clusters,
        })
    }

    /// Rebuild from `doc` and publish it.
    pub fn reload(&self, doc: RouteConfigurationDoc) -> RouteResult<()> {
        let config = RouteConfiguration::build(
            doc,
            self.runtime.clone(),
            self.cm.as_ref(),
            self.validate_clusters,
        )?;
        self.config.store(Arc::new(config));
        tracing::info!("Static route configuration reloaded");
        Ok(())
    }
}

impl RouteConfigProvider for StaticRouteConfigProvider {
    fn config(&self) -> Arc<RouteConfiguration> {
        self.config.load_full()
    }

    fn version_info(&self) -> String {
        String::new()
    }
}
