//! Admin and introspection API.
//!
//! # Endpoints
//! - `GET /status`: process status, init progress, per-source versions
//! - `GET /routes[?route_config_name=<name>]`: dynamic route table dump
//! - `GET /route_check?host=&path=[&method=][&proto=]`: resolve a request
//!   against every route source

pub mod auth;
pub mod handlers;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::lifecycle::{InitManager, NamedSource};
use crate::rds::{RouteConfigProvider, RouteConfigProviderManager, RouteSource};

use self::auth::admin_auth_middleware;
use self::handlers::{get_route_check, get_routes, get_status};

/// A route source as seen by the admin API.
#[derive(Clone)]
pub struct AdminSource {
    pub name: String,
    pub kind: &'static str,
    pub provider: Arc<dyn RouteConfigProvider>,
}

impl AdminSource {
    pub fn from_named(named: &NamedSource) -> Self {
        let kind = match named.source {
            RouteSource::Static { .. } => "static",
            RouteSource::Rds(_) => "rds",
        };
        Self {
            name: named.name.clone(),
            kind,
            provider: named.source.provider(),
        }
    }
}

#[derive(Clone)]
pub struct AdminState {
    pub manager: Arc<RouteConfigProviderManager>,
    pub sources: Arc<Vec<AdminSource>>,
    pub init: InitManager,
    /// Empty disables authentication.
    pub api_key: Arc<str>,
}

#[allow(deprecated)]
pub fn setup_admin_router(state: AdminState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/routes", get(get_routes))
        .route("/route_check", get(get_route_check))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// Serve `app` on `listener` until `shutdown` resolves.
///
/// The returned task completes once in-flight requests have drained.
pub fn spawn_admin_server<F>(listener: TcpListener, app: Router, shutdown: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            tracing::error!(error = %e, "Admin server failed");
        }
    })
}
