//! Route table build errors.

use thiserror::Error;

/// Errors raised while compiling a route configuration document.
///
/// All of these abort the build: a dynamically sourced table keeps its
/// previous generation, a statically sourced one fails startup.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("virtual host '{vhost}': route must set exactly one of prefix, path or regex")]
    AmbiguousMatch { vhost: String },

    #[error("virtual host '{vhost}': route must set exactly one of route or redirect")]
    AmbiguousAction { vhost: String },

    #[error("virtual host '{vhost}': route must set exactly one of cluster, cluster_header or weighted_clusters")]
    AmbiguousTarget { vhost: String },

    #[error("route: unknown cluster '{0}'")]
    UnknownCluster(String),

    #[error("route: unknown weighted cluster '{0}'")]
    UnknownWeightedCluster(String),

    #[error("route: unknown shadow cluster '{0}'")]
    UnknownShadowCluster(String),

    #[error("only unique values for domains are permitted, duplicate entry of domain '{0}'")]
    DuplicateDomain(String),

    #[error("only a single wildcard domain is permitted")]
    MultipleCatchAll,

    #[error("weighted clusters: sum of weights {actual} does not match total weight {expected}")]
    WeightSumMismatch { expected: u64, actual: u64 },

    #[error("weighted clusters: cluster '{0}' must have a positive weight")]
    ZeroWeight(String),

    #[error("weighted clusters: at least one cluster is required")]
    EmptyWeightedClusters,
}

pub type RouteResult<T> = Result<T, RouteError>;
