//! Dynamic route configuration provider behaviour.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use edge_router::http::HeaderMap;
use edge_router::lifecycle::InitManager;
use edge_router::rds::{FetchError, ProviderState, RdsCounter, RouteConfigProvider};

mod common;
use common::{manager_with, rds_config, settle, ScriptedFetcher};

const EMPTY_TABLE: &str = r#"{"virtual_hosts": []}"#;

const LOCAL_SERVICE_TABLE: &str = r#"
{
  "virtual_hosts": [
    {
      "name": "local_service",
      "domains": ["*"],
      "routes": [
        {"match": {"prefix": "/foo"}, "route": {"cluster_header": ":authority"}},
        {"match": {"prefix": "/bar"}, "route": {"cluster": "bar"}}
      ]
    }
  ]
}
"#;

async fn next_cycle() {
    tokio::time::advance(Duration::from_millis(1000)).await;
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn test_basic_update_cycle() {
    let (fetcher, script) = ScriptedFetcher::new();
    let (_runtime, manager) = manager_with(&["foo_cluster"], fetcher.clone());
    let init = InitManager::new();

    let rds = manager
        .get_route_config_provider(&rds_config("foo_cluster", "foo_route_config", 1000), "foo.", &init)
        .unwrap();
    settle().await;

    assert_eq!(
        fetcher.requests(),
        vec![(
            "foo_cluster".to_string(),
            "/v1/routes/foo_route_config/cluster_name/node_name".to_string()
        )]
    );
    assert_eq!(init.pending(), 1);
    assert_eq!(rds.state(), ProviderState::Initializing);

    // The initial empty table routes nothing.
    let foo_host = HeaderMap::from([(":authority", "foo")]);
    assert!(rds.config().route(&foo_host, 0).is_none());
    assert_eq!(rds.version_info(), "");
    assert_eq!(
        serde_json::to_value(manager.dump_routes(&[]).unwrap()).unwrap(),
        json!([{
            "version_info": "",
            "route_config_name": "foo_route_config",
            "cluster_name": "foo_cluster",
            "route_table_dump": {}
        }])
    );

    // First response releases init and publishes a named, empty table.
    script.send(Ok(EMPTY_TABLE.to_string())).unwrap();
    settle().await;
    init.wait().await;
    assert_eq!(rds.state(), ProviderState::Ready);
    assert!(rds.config().route(&foo_host, 0).is_none());

    let first_version = rds.version_info();
    assert!(first_version.starts_with("hash_"));
    assert_eq!(first_version.len(), 21);
    let only_name = json!([{
        "version_info": first_version,
        "route_config_name": "foo_route_config",
        "cluster_name": "foo_cluster",
        "route_table_dump": {"name": "foo_route_config"}
    }]);
    assert_eq!(serde_json::to_value(manager.dump_routes(&[]).unwrap()).unwrap(), only_name);

    // Same payload again: nothing is republished.
    next_cycle().await;
    assert_eq!(fetcher.requests().len(), 2);
    script.send(Ok(EMPTY_TABLE.to_string())).unwrap();
    settle().await;
    assert_eq!(rds.version_info(), first_version);
    assert_eq!(serde_json::to_value(manager.dump_routes(&[]).unwrap()).unwrap(), only_name);

    // A reader holding the previous generation keeps it across the swap.
    next_cycle().await;
    let previous = rds.config();
    assert_eq!(Arc::strong_count(&previous), 2);

    script.send(Ok(LOCAL_SERVICE_TABLE.to_string())).unwrap();
    settle().await;
    let second_version = rds.version_info();
    assert_ne!(second_version, first_version);

    // "bar" is unknown to the cluster manager; dynamic tables are not validated.
    let foo_path = HeaderMap::from([(":authority", "foo"), (":path", "/foo")]);
    let binding = rds.config().route(&foo_path, 0).unwrap();
    assert_eq!(binding.cluster_name(), Some("foo"));
    assert!(previous.route(&foo_path, 0).is_none());
    let bar_path = HeaderMap::from([(":authority", "foo"), (":path", "/bar")]);
    assert_eq!(rds.config().route(&bar_path, 0).unwrap().cluster_name(), Some("bar"));
    let baz_path = HeaderMap::from([(":authority", "foo"), (":path", "/baz")]);
    assert!(rds.config().route(&baz_path, 0).is_none());
    assert_eq!(Arc::strong_count(&previous), 1);

    let full_table = json!({
        "version_info": second_version,
        "route_config_name": "foo_route_config",
        "cluster_name": "foo_cluster",
        "route_table_dump": {
            "name": "foo_route_config",
            "virtual_hosts": [{
                "name": "local_service",
                "domains": ["*"],
                "routes": [
                    {"match": {"prefix": "/foo"}, "route": {"cluster_header": ":authority"}},
                    {"match": {"prefix": "/bar"}, "route": {"cluster": "bar"}}
                ]
            }]
        }
    });
    assert_eq!(
        serde_json::to_value(manager.dump_routes(&[]).unwrap()).unwrap(),
        json!([full_table.clone()])
    );
    let by_name = manager
        .dump_routes(&[("route_config_name".to_string(), "foo_route_config".to_string())])
        .unwrap();
    assert_eq!(serde_json::to_value(by_name).unwrap(), json!([full_table]));
    assert!(manager
        .dump_routes(&[("route_config_name".to_string(), "does_not_exist".to_string())])
        .unwrap()
        .is_empty());

    let usage = manager
        .dump_routes(&[("bad_param".to_string(), String::new())])
        .unwrap_err();
    assert_eq!(
        serde_json::to_value(usage).unwrap(),
        json!({
            "general_usage": "/routes (dump all dynamic HTTP route tables).",
            "specify_name_usage": "/routes?route_config_name=<name> (dump all dynamic HTTP route tables with the <name> if any)."
        })
    );

    let stats = rds.stats();
    assert_eq!(stats.get(RdsCounter::ConfigReload), 2);
    assert_eq!(stats.get(RdsCounter::UpdateAttempt), 3);
    assert_eq!(stats.get(RdsCounter::UpdateSuccess), 3);
    assert_eq!(stats.get(RdsCounter::UpdateFailure), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failures_keep_serving() {
    let (fetcher, script) = ScriptedFetcher::new();
    let (_runtime, manager) = manager_with(&["foo_cluster"], fetcher);
    let init = InitManager::new();
    let rds = manager
        .get_route_config_provider(&rds_config("foo_cluster", "foo_route_config", 1000), "foo.", &init)
        .unwrap();
    settle().await;

    // Unknown field: rejected, but startup is released anyway.
    script.send(Ok(r#"{"blah": true}"#.to_string())).unwrap();
    settle().await;
    assert_eq!(init.pending(), 0);
    assert_eq!(rds.version_info(), "");

    next_cycle().await;
    script.send(Err(FetchError::Timeout)).unwrap();
    settle().await;

    assert_eq!(rds.stats().get(RdsCounter::UpdateAttempt), 2);
    assert_eq!(rds.stats().get(RdsCounter::UpdateFailure), 2);
    assert_eq!(rds.stats().get(RdsCounter::UpdateSuccess), 0);

    // A good table followed by a bad one leaves the good one published.
    next_cycle().await;
    script.send(Ok(LOCAL_SERVICE_TABLE.to_string())).unwrap();
    settle().await;
    let version = rds.version_info();

    next_cycle().await;
    script.send(Err(FetchError::Status(503))).unwrap();
    settle().await;
    assert_eq!(rds.version_info(), version);
    let headers = HeaderMap::from([(":authority", "x"), (":path", "/bar")]);
    assert_eq!(rds.config().route(&headers, 0).unwrap().cluster_name(), Some("bar"));
    assert_eq!(rds.stats().get(RdsCounter::UpdateFailure), 3);
}

#[tokio::test(start_paused = true)]
async fn test_empty_resource_list() {
    let (fetcher, script) = ScriptedFetcher::new();
    let (_runtime, manager) = manager_with(&["foo_cluster"], fetcher);
    let init = InitManager::new();
    let rds = manager
        .get_route_config_provider(&rds_config("foo_cluster", "foo_route_config", 1000), "foo.", &init)
        .unwrap();
    settle().await;

    script.send(Ok("[]".to_string())).unwrap();
    settle().await;

    assert_eq!(init.pending(), 0);
    assert_eq!(rds.version_info(), "");
    assert_eq!(rds.stats().get(RdsCounter::UpdateAttempt), 1);
    assert_eq!(rds.stats().get(RdsCounter::UpdateEmpty), 1);
    assert_eq!(rds.stats().get(RdsCounter::UpdateSuccess), 1);
    assert_eq!(rds.stats().get(RdsCounter::ConfigReload), 0);
}

#[tokio::test(start_paused = true)]
async fn test_multiple_resources_rejected() {
    let (fetcher, script) = ScriptedFetcher::new();
    let (_runtime, manager) = manager_with(&["foo_cluster"], fetcher);
    let init = InitManager::new();
    let rds = manager
        .get_route_config_provider(&rds_config("foo_cluster", "foo_route_config", 1000), "foo.", &init)
        .unwrap();
    settle().await;

    script
        .send(Ok(r#"[{"name": "a"}, {"name": "b"}]"#.to_string()))
        .unwrap();
    settle().await;

    assert_eq!(rds.version_info(), "");
    assert_eq!(rds.stats().get(RdsCounter::UpdateFailure), 1);
    assert_eq!(init.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_during_initialize() {
    let (fetcher, _script) = ScriptedFetcher::new();
    let (_runtime, manager) = manager_with(&["foo_cluster"], fetcher.clone());
    let init = InitManager::new();
    let rds = manager
        .get_route_config_provider(&rds_config("foo_cluster", "foo_route_config", 1000), "foo.", &init)
        .unwrap();
    settle().await;
    assert_eq!(fetcher.requests().len(), 1);
    assert_eq!(init.pending(), 1);

    drop(rds);
    settle().await;
    assert_eq!(init.pending(), 0);
    assert!(manager.rds_route_config_providers().is_empty());

    // The fetch loop is gone: no further requests.
    next_cycle().await;
    next_cycle().await;
    assert_eq!(fetcher.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shared_provider_single_fetch_loop() {
    let (fetcher, script) = ScriptedFetcher::new();
    let (_runtime, manager) = manager_with(&["foo_cluster"], fetcher.clone());
    let init = InitManager::new();
    let source = rds_config("foo_cluster", "foo_route_config", 1000);

    let first = manager.get_route_config_provider(&source, "foo.", &init).unwrap();
    let second = manager.get_route_config_provider(&source, "bar.", &init).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    settle().await;
    assert_eq!(fetcher.requests().len(), 1);
    assert_eq!(init.pending(), 2);

    script.send(Ok(EMPTY_TABLE.to_string())).unwrap();
    settle().await;
    assert_eq!(init.pending(), 0);

    // Once initialized, a new requester is released immediately.
    let third = manager.get_route_config_provider(&source, "foo.", &init).unwrap();
    assert_eq!(init.pending(), 0);
    assert_eq!(third.version_info(), first.version_info());

    drop(first);
    drop(second);
    assert_eq!(manager.rds_route_config_providers().len(), 1);
    drop(third);
    assert!(manager.rds_route_config_providers().is_empty());

    // A fresh provider starts from scratch.
    let fresh = manager.get_route_config_provider(&source, "foo.", &init).unwrap();
    assert_eq!(fresh.version_info(), "");
    assert_eq!(init.pending(), 1);
}

#[tokio::test]
async fn test_creation_errors() {
    let (fetcher, _script) = ScriptedFetcher::new();
    let (_runtime, manager) = manager_with(&["foo_cluster"], fetcher);
    let init = InitManager::new();

    let unknown = manager.get_route_config_provider(
        &rds_config("bar_cluster", "foo_route_config", 1000),
        "foo.",
        &init,
    );
    assert!(unknown.is_err());
    assert_eq!(init.pending(), 0);
    assert!(manager.rds_route_config_providers().is_empty());
}
