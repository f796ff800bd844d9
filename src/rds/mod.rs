//! Route configuration providers.
//!
//! # Data Flow
//! ```text
//! Static source:
//!     route_config / route_config_path
//!     → static_config.rs (build once, optional file reload)
//!
//! Dynamic source (one fetch loop per (cluster, route_config_name)):
//!     manager.rs (registry of weak handles)
//!     → provider.rs (timer → fetch → parse → hash dedup → build)
//!     → subscription.rs (GET /v1/routes/<name>/<cluster>/<node>)
//!     → ArcSwap publish of the new Arc<RouteConfiguration>
//!
//! Readers:
//!     RouteConfigProvider::config() → Arc<RouteConfiguration> → route()
//! ```
//!
//! # Design Decisions
//! - Publication is a single pointer swap; readers never block writers
//! - A failed update never disturbs the published configuration
//! - Providers for the same source are shared; the last handle dropped
//!   cancels the fetch loop

pub mod manager;
pub mod provider;
pub mod static_config;
pub mod stats;
pub mod subscription;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::config::loader::{load_route_config, ConfigError};
use crate::config::RouteSourceConfig;
use crate::lifecycle::InitManager;
use crate::routing::{RouteConfiguration, RouteError};
use crate::runtime::Loader;
use crate::upstream::ClusterManager;

pub use manager::{RouteConfigProviderManager, RouteTableDump, RoutesUsage};
pub use provider::{ProviderState, RdsRouteConfigProvider};
pub use static_config::StaticRouteConfigProvider;
pub use stats::{RdsCounter, RdsStats, RdsStatsSnapshot};
pub use subscription::{FetchError, HttpRouteFetcher, RouteFetcher};

#[derive(Debug, Error)]
pub enum RdsError {
    #[error("Unexpected resource length: {0}")]
    UnexpectedResourceLength(usize),

    #[error("rds: local node cluster and node names must be set to use dynamic routes")]
    MissingLocalNode,

    #[error("rds: unknown rds cluster '{0}'")]
    UnknownCluster(String),

    #[error("route source '{0}': set exactly one of rds, route_config_path or route_config")]
    AmbiguousSource(String),

    #[error("failed to serialize route configuration: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Anything that can hand out the current route configuration.
pub trait RouteConfigProvider: Send + Sync {
    /// Currently published configuration. Callers keep the returned `Arc`
    /// for the lifetime of a request.
    fn config(&self) -> Arc<RouteConfiguration>;

    /// `hash_<16 hex digits>` of the applied configuration, empty if none.
    fn version_info(&self) -> String;
}

/// A configured route source and its provider.
pub enum RouteSource {
    Static {
        provider: Arc<StaticRouteConfigProvider>,
        /// Set when the configuration came from a file that may be watched.
        path: Option<PathBuf>,
    },
    Rds(Arc<RdsRouteConfigProvider>),
}

impl RouteSource {
    pub fn provider(&self) -> Arc<dyn RouteConfigProvider> {
        match self {
            RouteSource::Static { provider, .. } => provider.clone() as Arc<dyn RouteConfigProvider>,
            RouteSource::Rds(provider) => provider.clone() as Arc<dyn RouteConfigProvider>,
        }
    }
}

/// Build the provider for one `[[route_sources]]` entry.
///
/// Dynamic sources are obtained from `manager` so identical sources share a
/// fetch loop; each call registers one init target with `init`.
pub fn create_route_config_provider(
    source: &RouteSourceConfig,
    runtime: Arc<dyn Loader>,
    cm: Arc<dyn ClusterManager>,
    manager: &RouteConfigProviderManager,
    init: &InitManager,
) -> Result<RouteSource, RdsError> {
    let validate_clusters = source.validate_clusters.unwrap_or(true);
    match (&source.rds, &source.route_config_path, &source.route_config) {
        (Some(rds), None, None) => {
            let provider = manager.get_route_config_provider(rds, &source.stat_prefix, init)?;
            Ok(RouteSource::Rds(provider))
        }
        (None, Some(path), None) => {
            let doc = load_route_config(path)?;
            let provider = StaticRouteConfigProvider::new(doc, runtime, cm, validate_clusters)?;
            tracing::info!(path = ?path, "Loaded static route configuration");
            Ok(RouteSource::Static {
                provider: Arc::new(provider),
                path: Some(path.clone()),
            })
        }
        (None, None, Some(doc)) => {
            let provider = StaticRouteConfigProvider::new(doc.clone(), runtime, cm, validate_clusters)?;
            Ok(RouteSource::Static {
                provider: Arc::new(provider),
                path: None,
            })
        }
        _ => Err(RdsError::AmbiguousSource(source.stat_prefix.clone())),
    }
}
