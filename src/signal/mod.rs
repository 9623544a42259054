//! WebRTC signaling relay
//!
//! Offer, answer and ICE candidate messages are forwarded between the two
//! members of a room without being inspected.

pub mod relay;

pub use relay::{RelayOutcome, SignalKind, SignalMessage, SignalRelay};
