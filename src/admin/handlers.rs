use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::http::headers::names;
use crate::http::HeaderMap;
use crate::rds::{ProviderState, RdsStatsSnapshot};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub init_pending: usize,
    pub sources: Vec<SourceStatus>,
    pub rds: Vec<RdsStatus>,
}

#[derive(Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub kind: &'static str,
    pub version_info: String,
    pub virtual_hosts: usize,
}

#[derive(Serialize)]
pub struct RdsStatus {
    pub route_config_name: String,
    pub cluster_name: String,
    pub state: ProviderState,
    pub stats: RdsStatsSnapshot,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let init_pending = state.init.pending();
    let sources = state
        .sources
        .iter()
        .map(|source| {
            let config = source.provider.config();
            SourceStatus {
                name: source.name.clone(),
                kind: source.kind,
                version_info: source.provider.version_info(),
                virtual_hosts: config.matcher().virtual_hosts().len(),
            }
        })
        .collect();
    let rds = state
        .manager
        .rds_route_config_providers()
        .iter()
        .map(|p| RdsStatus {
            route_config_name: p.route_config_name().to_string(),
            cluster_name: p.cluster_name().to_string(),
            state: p.state(),
            stats: p.stats().snapshot(),
        })
        .collect();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if init_pending == 0 { "live" } else { "initializing" },
        init_pending,
        sources,
        rds,
    })
}

pub async fn get_routes(
    State(state): State<AdminState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    match state.manager.dump_routes(&params) {
        Ok(dump) => Json(dump).into_response(),
        Err(usage) => (StatusCode::NOT_FOUND, Json(usage)).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RouteCheckParams {
    pub host: String,
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Value for `x-forwarded-proto`.
    pub proto: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Serialize)]
pub struct RouteCheckResult {
    pub source: String,
    pub virtual_host: Option<String>,
    pub cluster: Option<String>,
    pub redirect: Option<String>,
    pub virtual_cluster: Option<String>,
}

/// Resolve a synthetic request against every route source.
pub async fn get_route_check(
    State(state): State<AdminState>,
    Query(params): Query<RouteCheckParams>,
) -> Json<Vec<RouteCheckResult>> {
    let mut headers = HeaderMap::new();
    headers.set(names::AUTHORITY, params.host);
    headers.set(names::PATH, params.path);
    headers.set(names::METHOD, params.method);
    if let Some(proto) = params.proto {
        headers.set(names::FORWARDED_PROTO, proto);
    }

    let results = state
        .sources
        .iter()
        .map(|source| {
            let binding = source.provider.config().route_request(&headers);
            RouteCheckResult {
                source: source.name.clone(),
                virtual_host: binding.as_ref().map(|b| b.virtual_host().name().to_string()),
                cluster: binding
                    .as_ref()
                    .and_then(|b| b.cluster_name())
                    .map(str::to_string),
                redirect: binding
                    .as_ref()
                    .and_then(|b| b.redirect_location())
                    .map(str::to_string),
                virtual_cluster: binding
                    .as_ref()
                    .and_then(|b| b.virtual_cluster(&headers))
                    .map(str::to_string),
            }
        })
        .collect();

    Json(results)
}
