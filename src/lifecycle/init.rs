//! Startup gate for components that initialise asynchronously.
//!
//! # Responsibilities
//! - Hand out one target per component that must be ready before serving
//! - Resolve `wait()` once every target has fired
//!
//! # Design Decisions
//! - Dropping a target fires it, so a component torn down before it ever
//!   became ready can never hang startup
//! - Targets are counted through a `watch` channel; waiters never poll

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug)]
struct InitState {
    pending: watch::Sender<usize>,
}

/// Tracks outstanding init targets.
#[derive(Debug, Clone)]
pub struct InitManager {
    state: Arc<InitState>,
}

impl InitManager {
    pub fn new() -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            state: Arc::new(InitState { pending }),
        }
    }

    /// Register a new target. `wait()` will not resolve until it fires.
    pub fn register(&self, name: impl Into<String>) -> InitTarget {
        self.state.pending.send_modify(|n| *n += 1);
        let name = name.into();
        tracing::debug!(target_name = %name, "Init target registered");
        InitTarget {
            name,
            state: Some(self.state.clone()),
        }
    }

    pub fn pending(&self) -> usize {
        *self.state.pending.borrow()
    }

    /// Resolve once no target is pending.
    pub async fn wait(&self) {
        let mut rx = self.state.pending.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for InitManager {
    fn default() -> Self {
        Self::new()
    }
}

/// One outstanding readiness obligation.
#[derive(Debug)]
pub struct InitTarget {
    name: String,
    state: Option<Arc<InitState>>,
}

impl InitTarget {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mark this target as ready.
    pub fn ready(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(state) = self.state.take() {
            state.pending.send_modify(|n| *n = n.saturating_sub(1));
            tracing::debug!(target_name = %self.name, "Init target ready");
        }
    }
}

impl Drop for InitTarget {
    fn drop(&mut self) {
        self.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_resolves_when_all_ready() {
        let init = InitManager::new();
        let a = init.register("a");
        let b = init.register("b");
        assert_eq!(init.pending(), 2);

        a.ready();
        assert_eq!(init.pending(), 1);
        assert!(tokio::time::timeout(Duration::from_millis(20), init.wait())
            .await
            .is_err());

        b.ready();
        tokio::time::timeout(Duration::from_secs(1), init.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_target_fires() {
        let init = InitManager::new();
        let target = init.register("dropped");
        drop(target);
        assert_eq!(init.pending(), 0);
        init.wait().await;
    }

    #[tokio::test]
    async fn test_no_targets_is_ready() {
        InitManager::new().wait().await;
    }
}
