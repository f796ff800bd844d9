//! Immutable route configuration generations and request bindings.

use std::fmt;
use std::sync::Arc;

use crate::config::route::RouteConfigurationDoc;
use crate::http::headers::names;
use crate::http::HeaderMap;
use crate::routing::entry::{RouteDecision, RoutePolicy, TargetCluster, WeightedCluster};
use crate::routing::error::RouteResult;
use crate::routing::policy::{header_values, CorsPolicy};
use crate::routing::table::RouteMatcher;
use crate::routing::virtual_host::VirtualHost;
use crate::runtime::Loader;
use crate::upstream::ClusterManager;

/// One compiled generation of a route configuration document.
///
/// Built once, never mutated, shared through `Arc` by every request that
/// captured it.
pub struct RouteConfiguration {
    name: String,
    matcher: RouteMatcher,
    runtime: Arc<dyn Loader>,
    internal_only_headers: Vec<String>,
    response_headers_to_add: Vec<(String, String)>,
    response_headers_to_remove: Vec<String>,
    request_headers_to_add: Vec<(String, String)>,
    uses_runtime: bool,
    doc: RouteConfigurationDoc,
}

impl RouteConfiguration {
    /// Compile `doc`. The document's own `validate_clusters` flag, when
    /// present, overrides `validate_clusters_default`.
    pub fn build(
        doc: RouteConfigurationDoc,
        runtime: Arc<dyn Loader>,
        cm: &dyn ClusterManager,
        validate_clusters_default: bool,
    ) -> RouteResult<Self> {
        let validate = doc.validate_clusters.unwrap_or(validate_clusters_default);
        let matcher = RouteMatcher::build(&doc.virtual_hosts, cm, validate)?;
        let uses_runtime = matcher.uses_runtime();

        Ok(Self {
            name: doc.name.clone(),
            matcher,
            runtime,
            internal_only_headers: doc
                .internal_only_headers
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            response_headers_to_add: header_values(&doc.response_headers_to_add),
            response_headers_to_remove: doc
                .response_headers_to_remove
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            request_headers_to_add: header_values(&doc.request_headers_to_add),
            uses_runtime,
            doc,
        })
    }

    /// Configuration that routes nothing.
    pub fn empty(runtime: Arc<dyn Loader>) -> Self {
        Self {
            name: String::new(),
            matcher: RouteMatcher::default(),
            runtime,
            internal_only_headers: Vec::new(),
            response_headers_to_add: Vec::new(),
            response_headers_to_remove: Vec::new(),
            request_headers_to_add: Vec::new(),
            uses_runtime: false,
            doc: RouteConfigurationDoc::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve a request. `random_value` is the per-request draw used by
    /// runtime gates and weighted selection.
    pub fn route(self: &Arc<Self>, headers: &HeaderMap, random_value: u64) -> Option<RouteBinding> {
        let (vhost, decision) = self.matcher.route(headers, random_value, self.runtime.as_ref())?;
        tracing::trace!(
            virtual_host = %vhost.name(),
            path = headers.path().unwrap_or(""),
            "route matched"
        );
        Some(RouteBinding {
            config: self.clone(),
            vhost,
            decision,
        })
    }

    /// Like [`route`](Self::route) with a fresh draw from the runtime.
    pub fn route_request(self: &Arc<Self>, headers: &HeaderMap) -> Option<RouteBinding> {
        self.route(headers, self.runtime.random())
    }

    pub fn matcher(&self) -> &RouteMatcher {
        &self.matcher
    }

    pub fn internal_only_headers(&self) -> &[String] {
        &self.internal_only_headers
    }

    pub fn response_headers_to_add(&self) -> &[(String, String)] {
        &self.response_headers_to_add
    }

    pub fn response_headers_to_remove(&self) -> &[String] {
        &self.response_headers_to_remove
    }

    pub fn request_headers_to_add(&self) -> &[(String, String)] {
        &self.request_headers_to_add
    }

    pub fn uses_runtime(&self) -> bool {
        self.uses_runtime
    }

    /// Document this generation was compiled from.
    pub fn doc(&self) -> &RouteConfigurationDoc {
        &self.doc
    }
}

impl fmt::Debug for RouteConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfiguration")
            .field("name", &self.name)
            .field("virtual_hosts", &self.matcher.virtual_hosts().len())
            .field("uses_runtime", &self.uses_runtime)
            .finish_non_exhaustive()
    }
}

/// Request-scoped result of a successful route lookup.
///
/// Holds the configuration generation it was resolved from, so the entry
/// and its policies stay valid even after a newer generation is published.
#[derive(Debug, Clone)]
pub struct RouteBinding {
    config: Arc<RouteConfiguration>,
    vhost: Arc<VirtualHost>,
    decision: RouteDecision,
}

impl RouteBinding {
    pub fn config(&self) -> &Arc<RouteConfiguration> {
        &self.config
    }

    pub fn virtual_host(&self) -> &VirtualHost {
        &self.vhost
    }

    pub fn decision(&self) -> &RouteDecision {
        &self.decision
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.decision, RouteDecision::Redirect { .. })
    }

    pub fn redirect_location(&self) -> Option<&str> {
        match &self.decision {
            RouteDecision::Redirect { location } => Some(location.as_str()),
            RouteDecision::Forward { .. } => None,
        }
    }

    pub fn cluster_name(&self) -> Option<&str> {
        match &self.decision {
            RouteDecision::Forward { cluster, .. } => Some(cluster.name()),
            RouteDecision::Redirect { .. } => None,
        }
    }

    /// Policy of the matched entry; shared with weighted siblings.
    pub fn policy(&self) -> Option<&RoutePolicy> {
        match &self.decision {
            RouteDecision::Forward { policy, .. } => Some(policy.as_ref()),
            RouteDecision::Redirect { .. } => None,
        }
    }

    pub fn weighted_cluster(&self) -> Option<&WeightedCluster> {
        match &self.decision {
            RouteDecision::Forward {
                cluster: TargetCluster::Weighted(cluster),
                ..
            } => Some(cluster.as_ref()),
            _ => None,
        }
    }

    /// Route-level CORS policy, falling back to the virtual host's.
    pub fn cors_policy(&self) -> Option<&CorsPolicy> {
        self.policy()
            .and_then(RoutePolicy::cors_policy)
            .or_else(|| self.vhost.cors_policy())
    }

    pub fn virtual_cluster(&self, headers: &HeaderMap) -> Option<&str> {
        self.vhost.virtual_cluster(headers)
    }

    /// Apply header additions and rewrites to the outbound request.
    ///
    /// Additions run configuration, then virtual host, then route, each
    /// replacing earlier values. Host and path rewrites run last.
    pub fn finalize_request_headers(&self, headers: &mut HeaderMap) {
        let additions = self
            .config
            .request_headers_to_add()
            .iter()
            .chain(self.vhost.request_headers_to_add());
        for (name, value) in additions {
            headers.set(name.as_str(), value.as_str());
        }

        let Some(policy) = self.policy() else {
            return;
        };
        for (name, value) in policy.request_headers_to_add() {
            headers.set(name.as_str(), value.as_str());
        }

        if let Some(host) = policy.host_rewrite() {
            headers.set(names::AUTHORITY, host);
        }

        if let Some(rewrite) = policy.path_rewrite() {
            if let Some(original) = headers.path().map(str::to_string) {
                let rewritten = rewrite.apply(&original);
                headers.set(names::ORIGINAL_PATH, original);
                headers.set(names::PATH, rewritten);
            }
        }
    }

    /// Apply configured additions and removals to the downstream response.
    pub fn finalize_response_headers(&self, headers: &mut HeaderMap) {
        for name in self.config.response_headers_to_remove() {
            headers.remove(name);
        }
        for (name, value) in self.config.response_headers_to_add() {
            headers.add(name.as_str(), value.as_str());
        }
    }
}
