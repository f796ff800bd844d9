//! Route entries: one configured routing rule each.
//!
//! # Responsibilities
//! - Evaluate path, header and runtime-fraction predicates, in that order
//! - Resolve the target: static cluster, header-derived cluster,
//!   weighted cluster pick, or redirect location
//! - Hold the policy bundle shared by the entry and its weighted children
//!
//! # Design Decisions
//! - Entry kinds are closed enums, not trait objects
//! - Weighted children share the parent's `Arc<RoutePolicy>` instead of
//!   pointing back at the parent
//! - Weighted selection reads every live weight once per call, so the
//!   total and the cumulative walk always agree

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::route::{
    RedirectActionDoc, RouteActionDoc, RouteDoc, SslRequirement, WeightedClustersDoc,
};
use crate::http::headers::names;
use crate::http::HeaderMap;
use crate::routing::error::{RouteError, RouteResult};
use crate::routing::matcher::{AndMatcher, Matcher, PathMatcher};
use crate::routing::policy::{
    header_values, CorsPolicy, Decorator, HashPolicy, RateLimitPolicy, RetryPolicy,
    RoutePriority, ShadowPolicy,
};
use crate::runtime::Loader;
use crate::upstream::ClusterManager;

/// Route timeout when none is configured.
pub const DEFAULT_ROUTE_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Default sum of weighted cluster weights.
pub const DEFAULT_TOTAL_WEIGHT: u64 = 100;

/// Runtime-controlled match gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeGate {
    pub key: String,
    pub default_value: u64,
    pub denominator: u64,
}

impl RuntimeGate {
    fn enabled(&self, runtime: &dyn Loader, random_value: u64) -> bool {
        runtime.feature_enabled(&self.key, self.default_value, random_value, self.denominator)
    }
}

/// One member of a weighted cluster set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedCluster {
    name: String,
    weight: u64,
    runtime_key: Option<String>,
}

impl WeightedCluster {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn static_weight(&self) -> u64 {
        self.weight
    }

    pub fn runtime_key(&self) -> Option<&str> {
        self.runtime_key.as_deref()
    }

    /// Weight after applying any runtime override.
    pub fn weight(&self, runtime: &dyn Loader) -> u64 {
        match &self.runtime_key {
            Some(key) => runtime.get_integer(key, self.weight),
            None => self.weight,
        }
    }
}

/// Ordered weighted cluster set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedClusters {
    clusters: Vec<Arc<WeightedCluster>>,
    total_weight: u64,
}

impl WeightedClusters {
    pub fn from_doc(doc: &WeightedClustersDoc) -> RouteResult<Self> {
        if doc.clusters.is_empty() {
            return Err(RouteError::EmptyWeightedClusters);
        }

        let mut clusters = Vec::with_capacity(doc.clusters.len());
        let mut sum = 0u64;
        for cluster in &doc.clusters {
            if cluster.weight == 0 {
                return Err(RouteError::ZeroWeight(cluster.name.clone()));
            }
            sum = sum.saturating_add(cluster.weight);
            let runtime_key = cluster.runtime_key.clone().or_else(|| {
                doc.runtime_key_prefix
                    .as_ref()
                    .map(|prefix| format!("{}.{}", prefix, cluster.name))
            });
            clusters.push(Arc::new(WeightedCluster {
                name: cluster.name.clone(),
                weight: cluster.weight,
                runtime_key,
            }));
        }

        let total_weight = doc.total_weight.unwrap_or(DEFAULT_TOTAL_WEIGHT);
        if sum != total_weight {
            return Err(RouteError::WeightSumMismatch {
                expected: total_weight,
                actual: sum,
            });
        }

        Ok(Self {
            clusters,
            total_weight,
        })
    }

    pub fn clusters(&self) -> &[Arc<WeightedCluster>] {
        &self.clusters
    }

    /// Configured sum of static weights.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn uses_runtime(&self) -> bool {
        self.clusters.iter().any(|c| c.runtime_key.is_some())
    }

    /// Pick a cluster for `random_value`.
    ///
    /// The draw is reduced modulo the sum of live weights and the first
    /// cluster whose cumulative weight exceeds it wins. Returns `None` when
    /// every live weight is zero.
    pub fn select(&self, runtime: &dyn Loader, random_value: u64) -> Option<&Arc<WeightedCluster>> {
        let weights: Vec<u64> = self.clusters.iter().map(|c| c.weight(runtime)).collect();
        let total = weights.iter().fold(0u64, |acc, w| acc.saturating_add(*w));
        if total == 0 {
            return None;
        }

        let draw = random_value % total;
        let mut end = 0u64;
        for (cluster, weight) in self.clusters.iter().zip(weights) {
            end = end.saturating_add(weight);
            if draw < end {
                return Some(cluster);
            }
        }
        None
    }
}

/// Where a redirect points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectAction {
    Configured {
        host_redirect: Option<String>,
        path_redirect: Option<String>,
        prefix_rewrite: Option<String>,
    },
    /// Same host and path over https.
    Https,
}

impl From<&RedirectActionDoc> for RedirectAction {
    fn from(doc: &RedirectActionDoc) -> Self {
        RedirectAction::Configured {
            host_redirect: doc.host_redirect.clone(),
            path_redirect: doc.path_redirect.clone(),
            prefix_rewrite: doc.prefix_rewrite.clone(),
        }
    }
}

/// What a matching entry resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    Cluster(Arc<str>),
    /// Cluster name taken from the named request header.
    ClusterHeader(String),
    Weighted(WeightedClusters),
    Redirect(RedirectAction),
}

impl RouteTarget {
    fn from_action(action: &RouteActionDoc, vhost: &str) -> RouteResult<Self> {
        match (
            &action.cluster,
            &action.cluster_header,
            &action.weighted_clusters,
        ) {
            (Some(cluster), None, None) => Ok(RouteTarget::Cluster(Arc::from(cluster.as_str()))),
            (None, Some(header), None) => Ok(RouteTarget::ClusterHeader(header.to_ascii_lowercase())),
            (None, None, Some(weighted)) => Ok(RouteTarget::Weighted(WeightedClusters::from_doc(weighted)?)),
            _ => Err(RouteError::AmbiguousTarget {
                vhost: vhost.to_string(),
            }),
        }
    }
}

/// Path rewrite applied when forwarding.
#[derive(Debug, Clone)]
pub struct PathRewrite {
    matcher: PathMatcher,
    replacement: String,
}

impl PathRewrite {
    pub fn apply(&self, path: &str) -> String {
        self.matcher.rewrite(path, &self.replacement)
    }
}

/// Policy bundle of a route entry, shared with its weighted children.
#[derive(Debug)]
pub struct RoutePolicy {
    timeout: Duration,
    retry_policy: RetryPolicy,
    shadow_policy: ShadowPolicy,
    hash_policy: Option<HashPolicy>,
    priority: RoutePriority,
    rate_limit_policy: RateLimitPolicy,
    include_vh_rate_limits: bool,
    cors_policy: Option<CorsPolicy>,
    auto_host_rewrite: bool,
    use_websocket: bool,
    host_rewrite: Option<String>,
    path_rewrite: Option<PathRewrite>,
    metadata: BTreeMap<String, String>,
    decorator: Option<Decorator>,
    request_headers_to_add: Vec<(String, String)>,
}

impl RoutePolicy {
    fn build(doc: &RouteDoc, path_matcher: Option<&PathMatcher>) -> Self {
        let empty = RouteActionDoc::default();
        let action = doc.route.as_ref().unwrap_or(&empty);
        let path_rewrite = match (path_matcher, &action.prefix_rewrite) {
            (Some(matcher), Some(replacement)) => Some(PathRewrite {
                matcher: matcher.clone(),
                replacement: replacement.clone(),
            }),
            _ => None,
        };

        Self {
            timeout: action
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_ROUTE_TIMEOUT),
            retry_policy: RetryPolicy::from_doc(action.retry_policy.as_ref()),
            shadow_policy: ShadowPolicy::from_doc(action.shadow.as_ref()),
            hash_policy: HashPolicy::from_docs(&action.hash_policy),
            priority: action.priority.unwrap_or_default(),
            rate_limit_policy: RateLimitPolicy::from_docs(&action.rate_limits),
            include_vh_rate_limits: action.include_vh_rate_limits.unwrap_or(false),
            cors_policy: action.cors.as_ref().map(CorsPolicy::from_doc),
            auto_host_rewrite: action.auto_host_rewrite.unwrap_or(false),
            use_websocket: action.use_websocket.unwrap_or(false),
            host_rewrite: action.host_rewrite.clone(),
            path_rewrite,
            metadata: doc.metadata.clone(),
            decorator: doc.decorator.as_ref().map(|d| Decorator::new(&d.operation)),
            request_headers_to_add: header_values(&doc.request_headers_to_add),
        }
    }

    fn empty() -> Self {
        Self::build(&RouteDoc::default(), None)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn shadow_policy(&self) -> &ShadowPolicy {
        &self.shadow_policy
    }

    pub fn hash_policy(&self) -> Option<&HashPolicy> {
        self.hash_policy.as_ref()
    }

    pub fn priority(&self) -> RoutePriority {
        self.priority
    }

    pub fn rate_limit_policy(&self) -> &RateLimitPolicy {
        &self.rate_limit_policy
    }

    pub fn include_virtual_host_rate_limits(&self) -> bool {
        self.include_vh_rate_limits
    }

    pub fn cors_policy(&self) -> Option<&CorsPolicy> {
        self.cors_policy.as_ref()
    }

    pub fn auto_host_rewrite(&self) -> bool {
        self.auto_host_rewrite
    }

    pub fn use_websocket(&self) -> bool {
        self.use_websocket
    }

    pub fn host_rewrite(&self) -> Option<&str> {
        self.host_rewrite.as_deref()
    }

    pub fn path_rewrite(&self) -> Option<&PathRewrite> {
        self.path_rewrite.as_ref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn decorator(&self) -> Option<&Decorator> {
        self.decorator.as_ref()
    }

    pub fn request_headers_to_add(&self) -> &[(String, String)] {
        &self.request_headers_to_add
    }
}

/// Cluster chosen by a forwarding entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetCluster {
    Static(Arc<str>),
    Header(String),
    Weighted(Arc<WeightedCluster>),
}

impl TargetCluster {
    pub fn name(&self) -> &str {
        match self {
            TargetCluster::Static(name) => name,
            TargetCluster::Header(name) => name.as_str(),
            TargetCluster::Weighted(cluster) => cluster.name(),
        }
    }
}

/// Outcome of a successful entry match.
#[derive(Debug, Clone)]
pub enum RouteDecision {
    Forward {
        policy: Arc<RoutePolicy>,
        cluster: TargetCluster,
    },
    Redirect {
        location: String,
    },
}

#[derive(Debug)]
enum EntryMatch {
    Path(PathMatcher),
    /// Matches requests that violate the virtual host's TLS requirement.
    Insecure(SslRequirement),
}

/// One routing rule.
#[derive(Debug)]
pub struct RouteEntry {
    matcher: EntryMatch,
    headers: AndMatcher,
    runtime: Option<RuntimeGate>,
    target: RouteTarget,
    policy: Arc<RoutePolicy>,
}

impl RouteEntry {
    pub fn from_doc(doc: &RouteDoc, vhost: &str) -> RouteResult<Self> {
        let path_matcher = PathMatcher::from_doc(&doc.route_match, vhost)?;
        let headers = AndMatcher::from_header_docs(&doc.route_match.headers)?;
        let runtime = doc.route_match.runtime.as_ref().map(|r| RuntimeGate {
            key: r.key.clone(),
            default_value: r.default_value,
            denominator: r.denominator.unwrap_or_default().value(),
        });

        let target = match (&doc.route, &doc.redirect) {
            (Some(action), None) => RouteTarget::from_action(action, vhost)?,
            (None, Some(redirect)) => RouteTarget::Redirect(RedirectAction::from(redirect)),
            _ => {
                return Err(RouteError::AmbiguousAction {
                    vhost: vhost.to_string(),
                })
            }
        };

        let policy = Arc::new(RoutePolicy::build(doc, Some(&path_matcher)));

        Ok(Self {
            matcher: EntryMatch::Path(path_matcher),
            headers,
            runtime,
            target,
            policy,
        })
    }

    /// Entry redirecting every request that does not satisfy `requirement`.
    pub fn ssl_redirect(requirement: SslRequirement) -> Self {
        Self {
            matcher: EntryMatch::Insecure(requirement),
            headers: AndMatcher::default(),
            runtime: None,
            target: RouteTarget::Redirect(RedirectAction::Https),
            policy: Arc::new(RoutePolicy::empty()),
        }
    }

    pub fn target(&self) -> &RouteTarget {
        &self.target
    }

    pub fn policy(&self) -> &Arc<RoutePolicy> {
        &self.policy
    }

    pub fn runtime_gate(&self) -> Option<&RuntimeGate> {
        self.runtime.as_ref()
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.target, RouteTarget::Redirect(_))
    }

    pub fn uses_runtime(&self) -> bool {
        self.runtime.is_some()
            || matches!(&self.target, RouteTarget::Weighted(w) if w.uses_runtime())
    }

    /// Check that every cluster this entry can send traffic to exists.
    /// Header-derived clusters cannot be checked ahead of time.
    pub fn validate_clusters(&self, cm: &dyn ClusterManager) -> RouteResult<()> {
        match &self.target {
            RouteTarget::Cluster(name) if !cm.has_cluster(name) => {
                return Err(RouteError::UnknownCluster(name.to_string()));
            }
            RouteTarget::Weighted(weighted) => {
                for cluster in weighted.clusters() {
                    if !cm.has_cluster(cluster.name()) {
                        return Err(RouteError::UnknownWeightedCluster(cluster.name().to_string()));
                    }
                }
            }
            _ => {}
        }

        let shadow = self.policy.shadow_policy().cluster();
        if !shadow.is_empty() && !cm.has_cluster(shadow) {
            return Err(RouteError::UnknownShadowCluster(shadow.to_string()));
        }
        Ok(())
    }

    /// Evaluate this entry against a request.
    ///
    /// `random_value` drives both the runtime gate and weighted selection so
    /// that retries of one request can reuse the same draw.
    pub fn matches(
        &self,
        headers: &HeaderMap,
        random_value: u64,
        runtime: &dyn Loader,
    ) -> Option<RouteDecision> {
        if !self.selects(headers, random_value, runtime) {
            return None;
        }
        self.resolve(headers, random_value, runtime)
    }

    /// Path predicate, then header constraints, then the runtime gate.
    /// An entry that selects a request ends the scan of its virtual host
    /// even when [`resolve`](Self::resolve) yields no target.
    pub fn selects(&self, headers: &HeaderMap, random_value: u64, runtime: &dyn Loader) -> bool {
        let predicate = match &self.matcher {
            EntryMatch::Path(matcher) => matcher.matches(headers),
            EntryMatch::Insecure(requirement) => is_insecure(*requirement, headers),
        };
        if !predicate || !self.headers.matches(headers) {
            return false;
        }
        self.runtime
            .as_ref()
            .map_or(true, |gate| gate.enabled(runtime, random_value))
    }

    /// Target of a selected entry. `None` when the cluster header is absent
    /// or every live weight is zero.
    pub fn resolve(
        &self,
        headers: &HeaderMap,
        random_value: u64,
        runtime: &dyn Loader,
    ) -> Option<RouteDecision> {
        let cluster = match &self.target {
            RouteTarget::Cluster(name) => TargetCluster::Static(name.clone()),
            RouteTarget::ClusterHeader(header) => {
                TargetCluster::Header(headers.get(header)?.to_string())
            }
            RouteTarget::Weighted(weighted) => {
                TargetCluster::Weighted(weighted.select(runtime, random_value)?.clone())
            }
            RouteTarget::Redirect(action) => {
                return Some(RouteDecision::Redirect {
                    location: self.redirect_location(action, headers),
                });
            }
        };

        Some(RouteDecision::Forward {
            policy: self.policy.clone(),
            cluster,
        })
    }

    fn redirect_location(&self, action: &RedirectAction, headers: &HeaderMap) -> String {
        let request_host = headers.host().unwrap_or("");
        let request_path = headers.path().unwrap_or("/");

        match action {
            RedirectAction::Https => format!("https://{}{}", request_host, request_path),
            RedirectAction::Configured {
                host_redirect,
                path_redirect,
                prefix_rewrite,
            } => {
                let scheme = headers.forwarded_proto().unwrap_or("http");
                let host = host_redirect.as_deref().unwrap_or(request_host);
                let path = match (path_redirect, prefix_rewrite, &self.matcher) {
                    (Some(path), _, _) => path.clone(),
                    (None, Some(replacement), EntryMatch::Path(matcher)) => {
                        matcher.rewrite(request_path, replacement)
                    }
                    _ => request_path.to_string(),
                };
                format!("{}://{}{}", scheme, host, path)
            }
        }
    }
}

fn is_insecure(requirement: SslRequirement, headers: &HeaderMap) -> bool {
    let https = headers.forwarded_proto() == Some("https");
    match requirement {
        SslRequirement::None => false,
        SslRequirement::All => !https,
        SslRequirement::ExternalOnly => {
            !https && headers.get(names::INTERNAL_REQUEST) != Some("true")
        }
    }
}
