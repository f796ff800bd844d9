//! Host resolution and route lookup.
//!
//! # Responsibilities
//! - Map the request authority to a virtual host
//! - Scan that host's entries for the first match
//!
//! # Design Decisions
//! - Exact domains live in one hash map: O(1) lookup
//! - Wildcard domains are grouped by suffix length, probed longest first:
//!   O(number of distinct suffix lengths)
//! - A single `*` domain acts as the catch-all
//! - Immutable after construction

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::route::VirtualHostDoc;
use crate::http::HeaderMap;
use crate::routing::entry::RouteDecision;
use crate::routing::error::{RouteError, RouteResult};
use crate::routing::virtual_host::VirtualHost;
use crate::runtime::Loader;
use crate::upstream::ClusterManager;

#[derive(Debug, Default)]
pub struct RouteMatcher {
    virtual_hosts: Vec<Arc<VirtualHost>>,
    exact: HashMap<String, Arc<VirtualHost>>,
    wildcards: BTreeMap<Reverse<usize>, HashMap<String, Arc<VirtualHost>>>,
    default_host: Option<Arc<VirtualHost>>,
}

impl RouteMatcher {
    pub fn build(
        docs: &[VirtualHostDoc],
        cm: &dyn ClusterManager,
        validate_clusters: bool,
    ) -> RouteResult<Self> {
        let mut matcher = Self::default();

        for doc in docs {
            let vhost = Arc::new(VirtualHost::from_doc(doc, cm, validate_clusters)?);
            for domain in &doc.domains {
                matcher.insert_domain(&domain.to_ascii_lowercase(), &vhost)?;
            }
            matcher.virtual_hosts.push(vhost);
        }

        Ok(matcher)
    }

    fn insert_domain(&mut self, domain: &str, vhost: &Arc<VirtualHost>) -> RouteResult<()> {
        if domain == "*" {
            if self.default_host.is_some() {
                return Err(RouteError::MultipleCatchAll);
            }
            self.default_host = Some(vhost.clone());
            return Ok(());
        }

        let (map, key) = match domain.strip_prefix('*') {
            Some(suffix) => (
                self.wildcards.entry(Reverse(suffix.len())).or_default(),
                suffix,
            ),
            None => (&mut self.exact, domain),
        };
        if map.insert(key.to_string(), vhost.clone()).is_some() {
            return Err(RouteError::DuplicateDomain(domain.to_string()));
        }
        Ok(())
    }

    /// Virtual hosts in configured order.
    pub fn virtual_hosts(&self) -> &[Arc<VirtualHost>] {
        &self.virtual_hosts
    }

    /// Resolve the request authority to a virtual host.
    pub fn find_virtual_host(&self, headers: &HeaderMap) -> Option<&Arc<VirtualHost>> {
        let host = normalize_host(headers.host().unwrap_or(""));

        if let Some(vhost) = self.exact.get(&host) {
            return Some(vhost);
        }

        // A wildcard needs at least one character in front of its suffix.
        for (Reverse(len), hosts) in &self.wildcards {
            if *len >= host.len() {
                continue;
            }
            let matched = host
                .get(host.len() - len..)
                .and_then(|suffix| hosts.get(suffix));
            if let Some(vhost) = matched {
                return Some(vhost);
            }
        }

        self.default_host.as_ref()
    }

    pub fn route(
        &self,
        headers: &HeaderMap,
        random_value: u64,
        runtime: &dyn Loader,
    ) -> Option<(Arc<VirtualHost>, RouteDecision)> {
        let vhost = self.find_virtual_host(headers)?;
        let decision = vhost.route(headers, random_value, runtime)?;
        Some((vhost.clone(), decision))
    }

    pub fn uses_runtime(&self) -> bool {
        self.virtual_hosts.iter().any(|v| v.uses_runtime())
    }
}

/// Lowercase the authority and drop a trailing `:port`. Bracketed IPv6
/// literals without a port are left alone.
fn normalize_host(authority: &str) -> String {
    let host = if authority.ends_with(']') {
        authority
    } else {
        match authority.rfind(':') {
            Some(idx) if authority[..idx].ends_with(']') || !authority[..idx].contains(':') => {
                &authority[..idx]
            }
            _ => authority,
        }
    };
    host.to_ascii_lowercase()
}
