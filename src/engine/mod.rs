//! The pairing engine
//!
//! One task owns the connection registry, the wait pool and the rooms, and
//! applies every input to them strictly one at a time. Everything else talks
//! to it through a [`PairingHandle`].

pub mod command;
pub mod handle;
pub mod service;

pub use command::{BoostOutcome, BoostSettled, PairingCommand, PairingStats};
pub use handle::PairingHandle;
pub use service::PairingService;
