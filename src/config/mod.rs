//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! bootstrap file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!
//! route file / collector payload (JSON)
//!     → route.rs (RouteConfigurationDoc)
//!     → routing::RouteConfiguration::build (compile matchers, validate)
//!     → atomic swap of Arc<RouteConfiguration>
//!
//! On route file change:
//!     watcher.rs detects change
//!     → loader.rs loads new document
//!     → static provider rebuilds and swaps
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod route;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::ConfigError;
pub use route::RouteConfigurationDoc;
pub use schema::{
    AdminConfig, ClusterConfig, LogFormat, NodeConfig, ObservabilityConfig, RdsConfig,
    RouteSourceConfig, RouterConfig, RuntimeConfig,
};
