//! Route configuration document.
//!
//! The serialized form of a route table as it appears in static route files
//! and in payloads served by configuration collectors. Unknown fields are
//! rejected so that malformed payloads fail parsing instead of being
//! silently half-applied.
//!
//! Serialization is canonical: optional and empty fields are omitted and
//! maps are ordered, so two documents with the same meaning serialize to
//! the same bytes. Content hashes and admin dumps depend on this.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A complete route table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfigurationDoc {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Overrides the caller's default for cluster validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_clusters: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub virtual_hosts: Vec<VirtualHostDoc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub internal_only_headers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_headers_to_add: Vec<HeaderValueDoc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_headers_to_remove: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_headers_to_add: Vec<HeaderValueDoc>,
}

/// Static header name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderValueDoc {
    pub key: String,
    pub value: String,
}

/// TLS requirement of a virtual host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SslRequirement {
    #[default]
    None,
    ExternalOnly,
    All,
}

impl SslRequirement {
    fn is_none(&self) -> bool {
        *self == SslRequirement::None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualHostDoc {
    pub name: String,

    pub domains: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteDoc>,

    #[serde(default, skip_serializing_if = "SslRequirement::is_none")]
    pub require_ssl: SslRequirement,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub virtual_clusters: Vec<VirtualClusterDoc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rate_limits: Vec<RateLimitDoc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors: Option<CorsDoc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_headers_to_add: Vec<HeaderValueDoc>,
}

/// Statistics bucket selected by path regex and optional method.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualClusterDoc {
    pub pattern: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    pub name: String,
}

/// One routing rule.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouteDoc {
    #[serde(rename = "match")]
    pub route_match: RouteMatchDoc,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteActionDoc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<RedirectActionDoc>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decorator: Option<DecoratorDoc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_headers_to_add: Vec<HeaderValueDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouteMatchDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    /// Defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderMatcherDoc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeFractionDoc>,
}

/// Header constraint. No value means presence only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderMatcherDoc {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FractionDenominator {
    #[default]
    Hundred,
    TenThousand,
    Million,
}

impl FractionDenominator {
    pub fn value(&self) -> u64 {
        match self {
            FractionDenominator::Hundred => 100,
            FractionDenominator::TenThousand => 10_000,
            FractionDenominator::Million => 1_000_000,
        }
    }
}

/// Runtime-controlled match gate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeFractionDoc {
    pub key: String,

    pub default_value: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominator: Option<FractionDenominator>,
}

/// Forwarding action. Exactly one of `cluster`, `cluster_header` and
/// `weighted_clusters` must be set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouteActionDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_header: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_clusters: Option<WeightedClustersDoc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_rewrite: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_rewrite: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_host_rewrite: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicyDoc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<ShadowPolicyDoc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hash_policy: Vec<HashPolicyDoc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<RoutePriority>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rate_limits: Vec<RateLimitDoc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_vh_rate_limits: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors: Option<CorsDoc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_websocket: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WeightedClustersDoc {
    pub clusters: Vec<WeightedClusterDoc>,

    /// Per-cluster runtime key becomes `<prefix>.<cluster name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_key_prefix: Option<String>,

    /// Expected sum of static weights. Defaults to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_weight: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WeightedClusterDoc {
    pub name: String,

    pub weight: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicyDoc {
    /// Comma separated retry conditions, e.g. "5xx,connect-failure".
    pub retry_on: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_try_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ShadowPolicyDoc {
    pub cluster: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HashPolicyDoc {
    pub header_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePriority {
    #[default]
    Default,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_key: Option<String>,

    pub actions: Vec<RateLimitActionDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitActionDoc {
    SourceCluster,
    DestinationCluster,
    RemoteAddress,
    RequestHeaders {
        header_name: String,
        descriptor_key: String,
    },
    GenericKey {
        descriptor_value: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CorsDoc {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_origin: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_methods: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_headers: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose_headers: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_credentials: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RedirectActionDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_redirect: Option<String>,

    /// Literal replacement for the whole path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_redirect: Option<String>,

    /// Replacement for the matched portion of the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_rewrite: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DecoratorDoc {
    pub operation: String,
}
