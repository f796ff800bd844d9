//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use edge_router::config::{NodeConfig, RdsConfig};
use edge_router::rds::{FetchError, RouteConfigProviderManager, RouteFetcher};
use edge_router::runtime::{Loader, RuntimeLoader};
use edge_router::upstream::{ClusterManager, StaticClusterManager};

/// Fetcher fed by the test one response at a time.
///
/// Each fetch waits for the next scripted response; once the script sender
/// is dropped, fetches never complete.
pub struct ScriptedFetcher {
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<String, FetchError>>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedFetcher {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<Result<String, FetchError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let fetcher = Arc::new(Self {
            rx: tokio::sync::Mutex::new(rx),
            requests: Mutex::new(Vec::new()),
        });
        (fetcher, tx)
    }

    /// (cluster, path) of every fetch issued so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

impl RouteFetcher for ScriptedFetcher {
    fn fetch<'a>(&'a self, cluster: &'a str, path: &'a str) -> BoxFuture<'a, Result<String, FetchError>> {
        self.requests
            .lock()
            .unwrap()
            .push((cluster.to_string(), path.to_string()));
        async move {
            let next = self.rx.lock().await.recv().await;
            match next {
                Some(response) => response,
                None => std::future::pending().await,
            }
        }
        .boxed()
    }
}

pub fn local_node() -> NodeConfig {
    NodeConfig {
        cluster: "cluster_name".into(),
        node: "node_name".into(),
    }
}

pub fn rds_config(cluster: &str, route_config_name: &str, refresh_delay_ms: u64) -> RdsConfig {
    RdsConfig {
        cluster: cluster.into(),
        route_config_name: route_config_name.into(),
        refresh_delay_ms,
    }
}

pub fn manager_with(
    clusters: &[&str],
    fetcher: Arc<dyn RouteFetcher>,
) -> (Arc<RuntimeLoader>, RouteConfigProviderManager) {
    let runtime = Arc::new(RuntimeLoader::new());
    let loader: Arc<dyn Loader> = runtime.clone();
    let cm: Arc<dyn ClusterManager> = Arc::new(StaticClusterManager::with_names(clusters.iter().copied()));
    let manager = RouteConfigProviderManager::new(loader, cm, local_node(), fetcher);
    (runtime, manager)
}

/// Let spawned tasks run until they block again.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Start a programmable collector on an ephemeral port.
///
/// `f` receives the request path and returns a status and body. Paths of
/// every request are recorded in the returned list.
pub async fn start_collector<F, Fut>(f: F) -> (SocketAddr, Arc<Mutex<Vec<String>>>)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);
    let recorded = seen.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let mut len = 0;
                        while len < buf.len() {
                            match socket.read(&mut buf[len..]).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => len += n,
                            }
                            if buf[..len].windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                        let request = String::from_utf8_lossy(&buf[..len]).to_string();
                        let path = request
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .unwrap_or("")
                            .to_string();
                        recorded.lock().unwrap().push(path.clone());

                        let (status, body) = f(path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, seen)
}
