//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Bootstrap config → runtime + cluster manager → route sources
//!     → init.rs (wait for every dynamic source's first fetch attempt)
//!     → admin listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → admin listener drains → providers dropped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then route sources, then listeners
//! - Dropping the route sources cancels every fetch loop

pub mod init;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use init::{InitManager, InitTarget};
pub use shutdown::Shutdown;
pub use startup::{bootstrap, bootstrap_with_fetcher, Bootstrap, NamedSource, StartupError};
