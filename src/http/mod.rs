//! HTTP primitives shared by the router.
//!
//! The connection/codec layer is an external collaborator: it builds a
//! [`HeaderMap`] per request and hands it to the routing table.

pub mod headers;

pub use headers::HeaderMap;
