//! Route file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::load_route_config;
use crate::rds::{RdsError, StaticRouteConfigProvider};

/// Watches a static route file and republishes it on change.
pub struct RouteFileWatcher {
    path: PathBuf,
    provider: Arc<StaticRouteConfigProvider>,
}

impl RouteFileWatcher {
    pub fn new(path: &Path, provider: Arc<StaticRouteConfigProvider>) -> Self {
        Self {
            path: path.to_path_buf(),
            provider,
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let provider = self.provider;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "Route file change detected, reloading");
                        if let Err(e) = reload_route_file(&path, &provider) {
                            tracing::error!(
                                path = ?path,
                                error = %e,
                                "Failed to reload route file, keeping current configuration"
                            );
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Route file watcher started");
        Ok(watcher)
    }
}

/// Load `path` and publish it through `provider`.
pub fn reload_route_file(path: &Path, provider: &StaticRouteConfigProvider) -> Result<(), RdsError> {
    let doc = load_route_config(path)?;
    provider.reload(doc)?;
    Ok(())
}
