//! Fetching route configuration payloads from a collector cluster.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;

use crate::config::route::RouteConfigurationDoc;
use crate::upstream::ClusterManager;

/// Default per-fetch deadline.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cluster '{0}' has no reachable endpoint")]
    NoEndpoint(String),

    #[error("invalid fetch url: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector returned status {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Source of raw route payloads.
///
/// `cluster` names the collector cluster, `path` is the request path.
pub trait RouteFetcher: Send + Sync {
    fn fetch<'a>(&'a self, cluster: &'a str, path: &'a str) -> BoxFuture<'a, Result<String, FetchError>>;
}

/// Request path for a route configuration owned by the local node.
pub fn fetch_path(route_config_name: &str, local_cluster: &str, local_node: &str) -> String {
    format!(
        "/v1/routes/{}/{}/{}",
        route_config_name, local_cluster, local_node
    )
}

/// Parse a payload into route configuration resources.
///
/// An object is a single resource, an array is a resource list.
pub fn parse_resources(body: &str) -> Result<Vec<RouteConfigurationDoc>, FetchError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let docs: Vec<RouteConfigurationDoc> = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(docs)
}

/// Fetcher issuing GET requests against the collector cluster's endpoint.
pub struct HttpRouteFetcher {
    client: reqwest::Client,
    cm: Arc<dyn ClusterManager>,
    timeout: Duration,
}

impl HttpRouteFetcher {
    pub fn new(cm: Arc<dyn ClusterManager>) -> Self {
        Self::with_timeout(cm, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(cm: Arc<dyn ClusterManager>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            cm,
            timeout,
        }
    }

    async fn get(&self, cluster: &str, path: &str) -> Result<String, FetchError> {
        let endpoint = self
            .cm
            .endpoint(cluster)
            .ok_or_else(|| FetchError::NoEndpoint(cluster.to_string()))?;
        let url = endpoint.join(path)?;

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { FetchError::Timeout } else { FetchError::Http(e) })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

impl RouteFetcher for HttpRouteFetcher {
    fn fetch<'a>(&'a self, cluster: &'a str, path: &'a str) -> BoxFuture<'a, Result<String, FetchError>> {
        self.get(cluster, path).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::StaticClusterManager;

    #[test]
    fn test_fetch_path() {
        assert_eq!(
            fetch_path("foo_route_config", "cluster_name", "node_name"),
            "/v1/routes/foo_route_config/cluster_name/node_name"
        );
    }

    #[test]
    fn test_parse_single_and_list() {
        let single = parse_resources(r#"{"virtual_hosts": []}"#).unwrap();
        assert_eq!(single.len(), 1);

        let empty = parse_resources("[]").unwrap();
        assert!(empty.is_empty());

        let two = parse_resources(r#"[{"name": "a"}, {"name": "b"}]"#).unwrap();
        assert_eq!(two.len(), 2);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            parse_resources(r#"{"blah": true}"#),
            Err(FetchError::Malformed(_))
        ));
        assert!(matches!(parse_resources("not json"), Err(FetchError::Malformed(_))));
        assert!(parse_resources("42").is_err());
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let cm = Arc::new(StaticClusterManager::with_names(["rds"]));
        let fetcher = HttpRouteFetcher::new(cm);
        let err = fetcher.fetch("rds", "/v1/routes/a/b/c").await.unwrap_err();
        assert!(matches!(err, FetchError::NoEndpoint(name) if name == "rds"));
    }
}
