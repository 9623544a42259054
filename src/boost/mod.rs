//! Boost token verification
//!
//! A boost lets a participant pin the partner gender it wants. The token is
//! checked against an external record store; any failure there is treated as
//! "no boost" so a join is never blocked by it.

pub mod record;
pub mod verifier;

pub use record::{evaluate_records, BoostRecord, RecordBoostVerifier};
pub use verifier::{
    build_verifier, BoostDecision, BoostVerifier, DisabledBoostVerifier, StaticBoostVerifier,
};
