//! Dynamic routes fetched over HTTP from a collector, and bootstrap wiring.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use edge_router::config::loader::parse_config;
use edge_router::config::ClusterConfig;
use edge_router::http::HeaderMap;
use edge_router::lifecycle::bootstrap_with_fetcher;
use edge_router::lifecycle::InitManager;
use edge_router::rds::{HttpRouteFetcher, RdsCounter, RouteConfigProvider, RouteConfigProviderManager, RouteSource};
use edge_router::runtime::RuntimeLoader;
use edge_router::upstream::StaticClusterManager;

mod common;
use common::{local_node, rds_config, start_collector, wait_until, ScriptedFetcher};

const TABLE: &str = r#"{"virtual_hosts": [{"name": "local_service", "domains": ["*"],
    "routes": [{"match": {"prefix": "/bar"}, "route": {"cluster": "bar"}}]}]}"#;

fn manager_for(collector_url: String) -> RouteConfigProviderManager {
    let cm = Arc::new(StaticClusterManager::new(&[ClusterConfig {
        name: "collector".into(),
        url: Some(collector_url),
    }]));
    RouteConfigProviderManager::new(
        Arc::new(RuntimeLoader::new()),
        cm.clone(),
        local_node(),
        Arc::new(HttpRouteFetcher::with_timeout(cm, Duration::from_secs(2))),
    )
}

#[tokio::test]
async fn test_fetch_from_collector() {
    let (addr, seen) = start_collector(|_path| async { (200, TABLE.to_string()) }).await;
    let manager = manager_for(format!("http://{}", addr));
    let init = InitManager::new();

    let rds = manager
        .get_route_config_provider(&rds_config("collector", "foo_route_config", 60_000), "foo.", &init)
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), init.wait())
        .await
        .unwrap();

    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["/v1/routes/foo_route_config/cluster_name/node_name".to_string()]
    );
    assert_eq!(rds.stats().get(RdsCounter::UpdateSuccess), 1);
    let headers = HeaderMap::from([(":authority", "any"), (":path", "/bar/1")]);
    assert_eq!(rds.config().route(&headers, 0).unwrap().cluster_name(), Some("bar"));
}

#[tokio::test]
async fn test_collector_error_status_counts_failure() {
    let (addr, _seen) = start_collector(|_path| async { (503, String::new()) }).await;
    let manager = manager_for(format!("http://{}", addr));
    let init = InitManager::new();

    let rds = manager
        .get_route_config_provider(&rds_config("collector", "foo_route_config", 60_000), "foo.", &init)
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), init.wait())
        .await
        .unwrap();

    assert!(
        wait_until(Duration::from_secs(5), || rds.stats().get(RdsCounter::UpdateFailure) == 1).await
    );
    assert_eq!(rds.version_info(), "");
}

#[tokio::test]
async fn test_bootstrap_builds_every_source_kind() {
    let mut route_file = tempfile::NamedTempFile::new().unwrap();
    write!(
        route_file,
        r#"{{"virtual_hosts": [{{"name": "file", "domains": ["*"],
            "routes": [{{"match": {{"prefix": "/"}}, "route": {{"cluster": "web"}}}}]}}]}}"#
    )
    .unwrap();

    let raw = format!(
        r#"
        [node]
        cluster = "cluster_name"
        node = "node_name"

        [[clusters]]
        name = "collector"
        url = "http://127.0.0.1:9"

        [[clusters]]
        name = "web"

        [[route_sources]]
        stat_prefix = "dynamic."
        rds = {{ cluster = "collector", route_config_name = "dyn_routes" }}

        [[route_sources]]
        stat_prefix = "file."
        route_config_path = "{}"

        [[route_sources]]
        stat_prefix = "inline."
        [route_sources.route_config]
        virtual_hosts = [{{ name = "inline", domains = ["*"], routes = [{{ match = {{ prefix = "/" }}, route = {{ cluster = "web" }} }}] }}]
        "#,
        route_file.path().display()
    );
    let config = parse_config(&raw).unwrap();

    let (fetcher, script) = ScriptedFetcher::new();
    let cm = Arc::new(StaticClusterManager::new(&config.clusters));
    let boot = bootstrap_with_fetcher(&config, cm, fetcher.clone()).unwrap();

    assert_eq!(boot.sources.len(), 3);
    assert_eq!(boot.watcher_count(), 1);
    let names: Vec<&str> = boot.sources.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["dynamic", "file", "inline"]);
    assert!(matches!(boot.sources[0].source, RouteSource::Rds(_)));
    assert!(matches!(
        boot.sources[1].source,
        RouteSource::Static { path: Some(_), .. }
    ));
    assert!(matches!(
        boot.sources[2].source,
        RouteSource::Static { path: None, .. }
    ));
    assert_eq!(boot.init.pending(), 1);

    script.send(Ok(TABLE.to_string())).unwrap();
    tokio::time::timeout(Duration::from_secs(5), boot.init.wait())
        .await
        .unwrap();
    assert!(boot.sources[0].source.provider().version_info().starts_with("hash_"));
    assert_eq!(
        fetcher.requests()[0].1,
        "/v1/routes/dyn_routes/cluster_name/node_name"
    );
}
