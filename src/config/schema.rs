//! Bootstrap configuration schema.
//!
//! This module defines the process-level configuration read from TOML.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::route::RouteConfigurationDoc;

/// Root configuration for the router process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Identity of this node, sent to configuration collectors.
    pub node: NodeConfig,

    /// Admin/introspection listener.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Upstream clusters known to the cluster manager.
    pub clusters: Vec<ClusterConfig>,

    /// Initial runtime overrides.
    pub runtime: RuntimeConfig,

    /// Route table sources, one per listener/connection manager.
    pub route_sources: Vec<RouteSourceConfig>,
}

/// Local node identity.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    /// Service cluster this node belongs to.
    pub cluster: String,

    /// Unique node name.
    pub node: String,
}

/// Upstream cluster definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Unique cluster name referenced by routes.
    pub name: String,

    /// Base URL for clusters that serve configuration (e.g. "http://127.0.0.1:9000").
    #[serde(default)]
    pub url: Option<String>,
}

/// Runtime overrides.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    pub overrides: HashMap<String, u64>,
}

/// Where a route table comes from.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouteSourceConfig {
    /// Prefix for this source's counters (e.g. "ingress.").
    pub stat_prefix: String,

    /// Dynamic source.
    pub rds: Option<RdsConfig>,

    /// Static route configuration file (JSON).
    pub route_config_path: Option<PathBuf>,

    /// Static route configuration given inline.
    pub route_config: Option<RouteConfigurationDoc>,

    /// Validate referenced clusters for static sources (default: true).
    pub validate_clusters: Option<bool>,
}

/// Dynamic route source settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RdsConfig {
    /// Collector cluster to fetch from.
    pub cluster: String,

    /// Name of the route configuration to fetch.
    pub route_config_name: String,

    /// Interval between fetches in milliseconds.
    #[serde(default = "default_refresh_delay_ms")]
    pub refresh_delay_ms: u64,
}

fn default_refresh_delay_ms() -> u64 {
    30_000
}

/// Admin listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin listener.
    pub enabled: bool,

    /// Bind address.
    pub bind_address: String,

    /// Bearer token required by admin endpoints. Empty disables auth.
    pub api_key: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
            api_key: String::new(),
            request_timeout_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
