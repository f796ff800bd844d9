//! Per-route and per-virtual-host policies.
//!
//! These are read by the proxying layer after a route is selected. They are
//! plain immutable values built once per configuration generation.

use std::collections::BTreeMap;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::config::route::{
    CorsDoc, HashPolicyDoc, HeaderValueDoc, RateLimitActionDoc, RateLimitDoc, RetryPolicyDoc,
    ShadowPolicyDoc,
};
use crate::http::HeaderMap;

pub use crate::config::route::RoutePriority;

/// Stable 64-bit digest: the first eight bytes of SHA-256.
pub fn hash64(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Lowercased name/value pairs from header documents.
pub fn header_values(docs: &[HeaderValueDoc]) -> Vec<(String, String)> {
    docs.iter()
        .map(|h| (h.key.to_ascii_lowercase(), h.value.clone()))
        .collect()
}

pub const RETRY_ON_5XX: u32 = 0x1;
pub const RETRY_ON_GATEWAY_ERROR: u32 = 0x2;
pub const RETRY_ON_CONNECT_FAILURE: u32 = 0x4;
pub const RETRY_ON_RETRIABLE_4XX: u32 = 0x8;
pub const RETRY_ON_REFUSED_STREAM: u32 = 0x10;

/// Parse a comma separated retry condition list into a bitmask.
/// Unknown conditions are ignored.
pub fn parse_retry_on(config: &str) -> u32 {
    config
        .split(',')
        .map(str::trim)
        .fold(0, |mask, token| {
            mask | match token {
                "5xx" => RETRY_ON_5XX,
                "gateway-error" => RETRY_ON_GATEWAY_ERROR,
                "connect-failure" => RETRY_ON_CONNECT_FAILURE,
                "retriable-4xx" => RETRY_ON_RETRIABLE_4XX,
                "refused-stream" => RETRY_ON_REFUSED_STREAM,
                _ => 0,
            }
        })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    retry_on: u32,
    num_retries: u32,
    per_try_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_doc(doc: Option<&RetryPolicyDoc>) -> Self {
        match doc {
            Some(doc) => Self {
                retry_on: parse_retry_on(&doc.retry_on),
                num_retries: doc.num_retries.unwrap_or(1),
                per_try_timeout: Duration::from_millis(doc.per_try_timeout_ms.unwrap_or(0)),
            },
            None => Self::default(),
        }
    }

    pub fn retry_on(&self) -> u32 {
        self.retry_on
    }

    pub fn num_retries(&self) -> u32 {
        self.num_retries
    }

    pub fn per_try_timeout(&self) -> Duration {
        self.per_try_timeout
    }
}

/// Mirror traffic to a second cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadowPolicy {
    cluster: String,
    runtime_key: String,
}

impl ShadowPolicy {
    pub fn from_doc(doc: Option<&ShadowPolicyDoc>) -> Self {
        match doc {
            Some(doc) => Self {
                cluster: doc.cluster.clone(),
                runtime_key: doc.runtime_key.clone().unwrap_or_default(),
            },
            None => Self::default(),
        }
    }

    /// Empty when shadowing is disabled.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn runtime_key(&self) -> &str {
        &self.runtime_key
    }
}

/// Consistent hashing input for the cluster's load balancer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashPolicy {
    header_name: String,
}

impl HashPolicy {
    /// Only the first configured policy is honoured.
    pub fn from_docs(docs: &[HashPolicyDoc]) -> Option<Self> {
        docs.first().map(|doc| Self {
            header_name: doc.header_name.to_ascii_lowercase(),
        })
    }

    pub fn generate_hash(&self, headers: &HeaderMap) -> Option<u64> {
        headers
            .get(&self.header_name)
            .map(|value| hash64(value.as_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    allow_origins: Vec<String>,
    allow_methods: String,
    allow_headers: String,
    expose_headers: String,
    max_age: String,
    allow_credentials: Option<bool>,
    enabled: bool,
}

impl CorsPolicy {
    pub fn from_doc(doc: &CorsDoc) -> Self {
        Self {
            allow_origins: doc.allow_origin.clone(),
            allow_methods: doc.allow_methods.clone().unwrap_or_default(),
            allow_headers: doc.allow_headers.clone().unwrap_or_default(),
            expose_headers: doc.expose_headers.clone().unwrap_or_default(),
            max_age: doc.max_age.clone().unwrap_or_default(),
            allow_credentials: doc.allow_credentials,
            enabled: doc.enabled.unwrap_or(true),
        }
    }

    pub fn allow_origins(&self) -> &[String] {
        &self.allow_origins
    }

    pub fn allow_methods(&self) -> &str {
        &self.allow_methods
    }

    pub fn allow_headers(&self) -> &str {
        &self.allow_headers
    }

    pub fn expose_headers(&self) -> &str {
        &self.expose_headers
    }

    pub fn max_age(&self) -> &str {
        &self.max_age
    }

    pub fn allow_credentials(&self) -> Option<bool> {
        self.allow_credentials
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

/// Tracing decoration for the selected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decorator {
    operation: String,
}

impl Decorator {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitAction {
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

impl From<&RateLimitActionDoc> for RateLimitAction {
    fn from(doc: &RateLimitActionDoc) -> Self {
        match doc {
            RateLimitActionDoc::SourceCluster => RateLimitAction::SourceCluster,
            RateLimitActionDoc::DestinationCluster => RateLimitAction::DestinationCluster,
            RateLimitActionDoc::RemoteAddress => RateLimitAction::RemoteAddress,
            RateLimitActionDoc::RequestHeaders {
                header_name,
                descriptor_key,
            } => RateLimitAction::RequestHeaders {
                header_name: header_name.to_ascii_lowercase(),
                descriptor_key: descriptor_key.clone(),
            },
            RateLimitActionDoc::GenericKey { descriptor_value } => RateLimitAction::GenericKey {
                descriptor_value: descriptor_value.clone(),
            },
        }
    }
}

/// Request facts a rate limit descriptor can be built from.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorContext<'a> {
    pub route_cluster: &'a str,
    pub local_cluster: &'a str,
    pub remote_address: &'a str,
    pub headers: &'a HeaderMap,
}

/// Ordered key/value entries sent to a rate limit service.
pub type Descriptor = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicyEntry {
    stage: u64,
    disable_key: String,
    actions: Vec<RateLimitAction>,
}

impl RateLimitPolicyEntry {
    pub fn stage(&self) -> u64 {
        self.stage
    }

    pub fn disable_key(&self) -> &str {
        &self.disable_key
    }

    /// Build a descriptor; `None` if any action cannot produce its entry.
    pub fn populate_descriptor(&self, ctx: &DescriptorContext<'_>) -> Option<Descriptor> {
        self.actions
            .iter()
            .map(|action| match action {
                RateLimitAction::SourceCluster => {
                    Some(("source_cluster".to_string(), ctx.local_cluster.to_string()))
                }
                RateLimitAction::DestinationCluster => Some((
                    "destination_cluster".to_string(),
                    ctx.route_cluster.to_string(),
                )),
                RateLimitAction::RemoteAddress if ctx.remote_address.is_empty() => None,
                RateLimitAction::RemoteAddress => Some((
                    "remote_address".to_string(),
                    ctx.remote_address.to_string(),
                )),
                RateLimitAction::RequestHeaders {
                    header_name,
                    descriptor_key,
                } => ctx
                    .headers
                    .get(header_name)
                    .map(|value| (descriptor_key.clone(), value.to_string())),
                RateLimitAction::GenericKey { descriptor_value } => {
                    Some(("generic_key".to_string(), descriptor_value.clone()))
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitPolicy {
    by_stage: BTreeMap<u64, Vec<RateLimitPolicyEntry>>,
}

impl RateLimitPolicy {
    pub fn from_docs(docs: &[RateLimitDoc]) -> Self {
        let mut by_stage: BTreeMap<u64, Vec<RateLimitPolicyEntry>> = BTreeMap::new();
        for doc in docs {
            let entry = RateLimitPolicyEntry {
                stage: doc.stage.unwrap_or(0),
                disable_key: doc.disable_key.clone().unwrap_or_default(),
                actions: doc.actions.iter().map(RateLimitAction::from).collect(),
            };
            by_stage.entry(entry.stage).or_default().push(entry);
        }
        Self { by_stage }
    }

    pub fn entries_for_stage(&self, stage: u64) -> &[RateLimitPolicyEntry] {
        self.by_stage.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_stage.is_empty()
    }
}
