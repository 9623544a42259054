//! Connection registry and per-connection metadata

pub mod country;
pub mod registry;

pub use country::HeaderCountryResolver;
pub use registry::{ConnectionEntry, ConnectionRegistry, LiveConnections, Outbound};
