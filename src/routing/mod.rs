//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (per configuration generation):
//!     RouteConfigurationDoc
//!     → table.rs (domain maps: exact, wildcard by suffix length, catch-all)
//!     → virtual_host.rs (ordered entries, virtual clusters)
//!     → entry.rs (compiled matchers, target, shared policy)
//!     → Freeze as immutable Arc<RouteConfiguration>
//!
//! Incoming Request (headers, random draw)
//!     → config.rs (RouteConfiguration::route)
//!     → table.rs (virtual host lookup)
//!     → entry.rs (first matching entry)
//!     → Return: RouteBinding or no route
//! ```
//!
//! # Design Decisions
//! - Configurations are compiled once, immutable afterwards
//! - Invalid configuration fails the build, never a request
//! - Deterministic: the same headers, draw and runtime values always
//!   select the same target
//! - First match wins (configured order)

pub mod config;
pub mod entry;
pub mod error;
pub mod matcher;
pub mod policy;
pub mod table;
pub mod virtual_host;

pub use config::{RouteBinding, RouteConfiguration};
pub use entry::{RouteDecision, RouteEntry, RoutePolicy, TargetCluster, WeightedCluster};
pub use error::{RouteError, RouteResult};
pub use table::RouteMatcher;
pub use virtual_host::VirtualHost;
