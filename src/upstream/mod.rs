//! Upstream cluster registry.
//!
//! Host selection, health checking and load balancing inside a cluster
//! belong to the cluster manager collaborator. The router only needs to
//! know which cluster names exist (for optional validation) and where a
//! configuration collector cluster can be reached.

use std::collections::HashMap;

use url::Url;

use crate::config::ClusterConfig;

/// Cluster manager capabilities the router relies on.
pub trait ClusterManager: Send + Sync {
    /// True if a cluster with this name is configured.
    fn has_cluster(&self, name: &str) -> bool;

    /// Base URL used to issue requests against the cluster.
    fn endpoint(&self, name: &str) -> Option<Url>;
}

/// Cluster manager backed by the bootstrap `[[clusters]]` table.
#[derive(Debug, Default, Clone)]
pub struct StaticClusterManager {
    clusters: HashMap<String, Option<Url>>,
}

impl StaticClusterManager {
    pub fn new(configs: &[ClusterConfig]) -> Self {
        let mut clusters = HashMap::new();
        for config in configs {
            let url = match config.url.as_deref().map(Url::parse) {
                Some(Ok(url)) => Some(url),
                Some(Err(e)) => {
                    tracing::warn!(cluster = %config.name, error = %e, "Invalid cluster URL");
                    None
                }
                None => None,
            };
            clusters.insert(config.name.clone(), url);
        }
        Self { clusters }
    }

    /// Cluster manager that knows the given names and has no endpoints.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            clusters: names.into_iter().map(|n| (n.into(), None)).collect(),
        }
    }
}

impl ClusterManager for StaticClusterManager {
    fn has_cluster(&self, name: &str) -> bool {
        self.clusters.contains_key(name)
    }

    fn endpoint(&self, name: &str) -> Option<Url> {
        self.clusters.get(name).cloned().flatten()
    }
}
