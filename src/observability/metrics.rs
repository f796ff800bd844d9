//! Metrics exposition.
//!
//! Counter names are documented in [`crate::rds::stats`].

use std::net::SocketAddr;

use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::rds::{RdsCounter, RdsStats};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus recorder"),
    }
}

/// Describe the counters of one route source.
pub fn describe_rds_counters(stat_prefix: &str) {
    let stats = RdsStats::new(stat_prefix);
    for counter in RdsCounter::ALL {
        describe_counter!(stats.metric_name(counter), describe(counter));
    }
}

fn describe(counter: RdsCounter) -> &'static str {
    match counter {
        RdsCounter::ConfigReload => "Route configurations published",
        RdsCounter::UpdateAttempt => "Route configuration fetches started",
        RdsCounter::UpdateSuccess => "Route configuration fetches applied",
        RdsCounter::UpdateFailure => "Route configuration fetches rejected",
        RdsCounter::UpdateEmpty => "Route configuration payloads without resources",
    }
}
