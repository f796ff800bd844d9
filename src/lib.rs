//! Request-routing core of an edge proxy.
//!
//! Maps each request to a virtual host, a route entry and finally an
//! upstream cluster or a redirect. Route tables come from the bootstrap
//! file, a local JSON file, or a collector cluster polled over HTTP.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rds;
pub mod routing;
pub mod runtime;
pub mod upstream;

pub use config::RouterConfig;
pub use lifecycle::Shutdown;
pub use rds::{RouteConfigProvider, RouteConfigProviderManager};
pub use routing::{RouteBinding, RouteConfiguration};
