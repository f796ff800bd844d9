//! Virtual hosts: ordered route entries reachable through a set of domains.

use regex::Regex;

use crate::config::route::{SslRequirement, VirtualClusterDoc, VirtualHostDoc};
use crate::http::headers::strip_query;
use crate::http::HeaderMap;
use crate::routing::entry::{RouteDecision, RouteEntry};
use crate::routing::error::RouteResult;
use crate::routing::matcher::compile_full_match;
use crate::routing::policy::{header_values, CorsPolicy, RateLimitPolicy};
use crate::runtime::Loader;
use crate::upstream::ClusterManager;

/// Stat bucket for requests that match none of a host's virtual clusters.
pub const OTHER_VIRTUAL_CLUSTER: &str = "other";

/// Regex plus optional method mapping requests to a stat bucket.
#[derive(Debug, Clone)]
pub struct VirtualCluster {
    name: String,
    pattern: Regex,
    method: Option<String>,
}

impl VirtualCluster {
    pub fn from_doc(doc: &VirtualClusterDoc) -> RouteResult<Self> {
        Ok(Self {
            name: doc.name.clone(),
            pattern: compile_full_match(&doc.pattern, false)?,
            method: doc.method.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, headers: &HeaderMap) -> bool {
        if let Some(method) = &self.method {
            if headers.method() != Some(method.as_str()) {
                return false;
            }
        }
        headers
            .path()
            .map(|path| self.pattern.is_match(strip_query(path)))
            .unwrap_or(false)
    }
}

#[derive(Debug)]
pub struct VirtualHost {
    name: String,
    ssl_requirement: SslRequirement,
    routes: Vec<RouteEntry>,
    virtual_clusters: Vec<VirtualCluster>,
    cors_policy: Option<CorsPolicy>,
    rate_limit_policy: RateLimitPolicy,
    request_headers_to_add: Vec<(String, String)>,
}

impl VirtualHost {
    /// Compile a virtual host. When TLS is required the redirect entry is
    /// placed ahead of every configured route.
    pub fn from_doc(
        doc: &VirtualHostDoc,
        cm: &dyn ClusterManager,
        validate_clusters: bool,
    ) -> RouteResult<Self> {
        let mut routes = Vec::with_capacity(doc.routes.len() + 1);
        if doc.require_ssl != SslRequirement::None {
            routes.push(RouteEntry::ssl_redirect(doc.require_ssl));
        }

        for route in &doc.routes {
            let entry = RouteEntry::from_doc(route, &doc.name)?;
            if validate_clusters {
                entry.validate_clusters(cm)?;
            }
            routes.push(entry);
        }

        let virtual_clusters = doc
            .virtual_clusters
            .iter()
            .map(VirtualCluster::from_doc)
            .collect::<RouteResult<Vec<_>>>()?;

        Ok(Self {
            name: doc.name.clone(),
            ssl_requirement: doc.require_ssl,
            routes,
            virtual_clusters,
            cors_policy: doc.cors.as_ref().map(CorsPolicy::from_doc),
            rate_limit_policy: RateLimitPolicy::from_docs(&doc.rate_limits),
            request_headers_to_add: header_values(&doc.request_headers_to_add),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ssl_requirement(&self) -> SslRequirement {
        self.ssl_requirement
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn cors_policy(&self) -> Option<&CorsPolicy> {
        self.cors_policy.as_ref()
    }

    pub fn rate_limit_policy(&self) -> &RateLimitPolicy {
        &self.rate_limit_policy
    }

    pub fn request_headers_to_add(&self) -> &[(String, String)] {
        &self.request_headers_to_add
    }

    /// First entry in configured order that selects the request wins. Later
    /// entries are not consulted even if the winner resolves to no target.
    pub fn route(
        &self,
        headers: &HeaderMap,
        random_value: u64,
        runtime: &dyn Loader,
    ) -> Option<RouteDecision> {
        self.routes
            .iter()
            .find(|entry| entry.selects(headers, random_value, runtime))?
            .resolve(headers, random_value, runtime)
    }

    /// Stat bucket for the request, or `None` when the host defines no
    /// virtual clusters.
    pub fn virtual_cluster(&self, headers: &HeaderMap) -> Option<&str> {
        if self.virtual_clusters.is_empty() {
            return None;
        }
        Some(
            self.virtual_clusters
                .iter()
                .find(|vc| vc.matches(headers))
                .map(VirtualCluster::name)
                .unwrap_or(OTHER_VIRTUAL_CLUSTER),
        )
    }

    pub fn uses_runtime(&self) -> bool {
        self.routes.iter().any(RouteEntry::uses_runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::route::{RouteActionDoc, RouteDoc, RouteMatchDoc};
    use crate::runtime::RuntimeLoader;
    use crate::upstream::StaticClusterManager;

    fn route(prefix: &str, cluster: &str) -> RouteDoc {
        RouteDoc {
            route_match: RouteMatchDoc {
                prefix: Some(prefix.into()),
                ..Default::default()
            },
            route: Some(RouteActionDoc {
                cluster: Some(cluster.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn host(routes: Vec<RouteDoc>) -> VirtualHostDoc {
        VirtualHostDoc {
            name: "www".into(),
            domains: vec!["www.example.com".into()],
            routes,
            ..Default::default()
        }
    }

    fn picked(vhost: &VirtualHost, path: &str) -> Option<String> {
        let headers = HeaderMap::from([(":authority", "www.example.com"), (":path", path)]);
        match vhost.route(&headers, 0, &RuntimeLoader::new())? {
            RouteDecision::Forward { cluster, .. } => Some(cluster.name().to_string()),
            RouteDecision::Redirect { location } => Some(location),
        }
    }

    #[test]
    fn test_first_match_wins() {
        let cm = StaticClusterManager::with_names(["api_v1", "api", "web"]);
        let vhost = VirtualHost::from_doc(
            &host(vec![
                route("/api/v1", "api_v1"),
                route("/api", "api"),
                route("/", "web"),
            ]),
            &cm,
            true,
        )
        .unwrap();

        assert_eq!(picked(&vhost, "/api/v1/users"), Some("api_v1".into()));
        assert_eq!(picked(&vhost, "/api/v2"), Some("api".into()));
        assert_eq!(picked(&vhost, "/index.html"), Some("web".into()));
    }

    #[test]
    fn test_order_shadows_later_entries() {
        let cm = StaticClusterManager::with_names(["web", "api"]);
        let vhost = VirtualHost::from_doc(
            &host(vec![route("/", "web"), route("/api", "api")]),
            &cm,
            true,
        )
        .unwrap();
        assert_eq!(picked(&vhost, "/api/v1"), Some("web".into()));
    }

    #[test]
    fn test_no_entry_matches() {
        let cm = StaticClusterManager::with_names(["foo", "bar"]);
        let vhost = VirtualHost::from_doc(
            &host(vec![route("/foo", "foo"), route("/bar", "bar")]),
            &cm,
            true,
        )
        .unwrap();
        assert_eq!(picked(&vhost, "/bar"), Some("bar".into()));
        assert_eq!(picked(&vhost, "/baz"), None);
    }

    #[test]
    fn test_unresolved_target_does_not_fall_through() {
        let cm = StaticClusterManager::with_names(["fallback"]);
        let mut by_header = route("/foo", "unused");
        by_header.route = Some(RouteActionDoc {
            cluster_header: Some("x-cluster".into()),
            ..Default::default()
        });
        let vhost = VirtualHost::from_doc(
            &host(vec![by_header, route("/", "fallback")]),
            &cm,
            true,
        )
        .unwrap();

        assert_eq!(picked(&vhost, "/foo"), None);
        assert_eq!(picked(&vhost, "/other"), Some("fallback".into()));

        let headers = HeaderMap::from([
            (":authority", "www.example.com"),
            (":path", "/foo"),
            ("x-cluster", "tenant"),
        ]);
        match vhost.route(&headers, 0, &RuntimeLoader::new()) {
            Some(RouteDecision::Forward { cluster, .. }) => assert_eq!(cluster.name(), "tenant"),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_cluster_validation_is_opt_in() {
        let cm = StaticClusterManager::with_names(["web"]);
        let doc = host(vec![route("/", "missing")]);
        assert!(VirtualHost::from_doc(&doc, &cm, true).is_err());
        assert!(VirtualHost::from_doc(&doc, &cm, false).is_ok());
    }

    #[test]
    fn test_ssl_redirect_precedes_routes() {
        let cm = StaticClusterManager::with_names(["web"]);
        let mut doc = host(vec![route("/", "web")]);
        doc.require_ssl = SslRequirement::All;
        let vhost = VirtualHost::from_doc(&doc, &cm, true).unwrap();
        assert_eq!(vhost.routes().len(), 2);
        assert_eq!(
            picked(&vhost, "/login"),
            Some("https://www.example.com/login".into())
        );
    }

    #[test]
    fn test_virtual_clusters() {
        let cm = StaticClusterManager::with_names(["web"]);
        let mut doc = host(vec![route("/", "web")]);
        let plain = VirtualHost::from_doc(&doc, &cm, true).unwrap();
        let headers = HeaderMap::from([(":path", "/users/1"), (":method", "GET")]);
        assert_eq!(plain.virtual_cluster(&headers), None);

        doc.virtual_clusters = vec![VirtualClusterDoc {
            pattern: "/users/[0-9]+".into(),
            method: Some("GET".into()),
            name: "get_user".into(),
        }];
        let vhost = VirtualHost::from_doc(&doc, &cm, true).unwrap();
        assert_eq!(vhost.virtual_cluster(&headers), Some("get_user"));

        let post = HeaderMap::from([(":path", "/users/1?x=1"), (":method", "POST")]);
        assert_eq!(vhost.virtual_cluster(&post), Some(OTHER_VIRTUAL_CLUSTER));
    }
}
