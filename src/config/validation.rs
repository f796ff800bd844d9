//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (dynamic sources reference known clusters)
//! - Validate value ranges (refresh delays > 0, URLs parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Route tables themselves are validated when they are built, not here

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::RouterConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate cluster name '{0}'")]
    DuplicateCluster(String),

    #[error("cluster '{name}' has an invalid url: {reason}")]
    InvalidClusterUrl { name: String, reason: String },

    #[error("route source {index}: exactly one of rds, route_config_path or route_config must be set")]
    AmbiguousRouteSource { index: usize },

    #[error("route source {index}: dynamic routes require node.cluster and node.node")]
    MissingNodeIdentity { index: usize },

    #[error("route source {index}: refresh_delay_ms must be greater than zero")]
    ZeroRefreshDelay { index: usize },

    #[error("route source {index}: rds cluster '{cluster}' is not a configured cluster")]
    UnknownRdsCluster { index: usize, cluster: String },
}

/// Validate a parsed bootstrap configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut names = HashSet::new();
    for cluster in &config.clusters {
        if !names.insert(cluster.name.as_str()) {
            errors.push(ValidationError::DuplicateCluster(cluster.name.clone()));
        }
        if let Some(raw) = &cluster.url {
            if let Err(e) = url::Url::parse(raw) {
                errors.push(ValidationError::InvalidClusterUrl {
                    name: cluster.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    for (index, source) in config.route_sources.iter().enumerate() {
        let kinds = [
            source.rds.is_some(),
            source.route_config_path.is_some(),
            source.route_config.is_some(),
        ];
        if kinds.iter().filter(|set| **set).count() != 1 {
            errors.push(ValidationError::AmbiguousRouteSource { index });
            continue;
        }

        if let Some(rds) = &source.rds {
            if config.node.cluster.is_empty() || config.node.node.is_empty() {
                errors.push(ValidationError::MissingNodeIdentity { index });
            }
            if rds.refresh_delay_ms == 0 {
                errors.push(ValidationError::ZeroRefreshDelay { index });
            }
            if !names.contains(rds.cluster.as_str()) {
                errors.push(ValidationError::UnknownRdsCluster {
                    index,
                    cluster: rds.cluster.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
