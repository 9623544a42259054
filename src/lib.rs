//! Pairing Room - anonymous one-to-one video pairing service
//!
//! This crate pairs anonymous visitors over WebSocket by gender preference,
//! shared interests and country filters, widens the search once a visitor
//! has waited long enough, and relays WebRTC signaling between the two
//! members of a room.

pub mod boost;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod matchmaking;
pub mod metrics;
pub mod room;
pub mod service;
pub mod signal;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{PairingError, Result};
pub use types::*;

// Re-export key components
pub use engine::{PairingHandle, PairingService, PairingStats};
pub use transport::{ClientMessage, ServerMessage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
