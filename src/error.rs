//! Error types for the pairing service
//!
//! Application wiring uses anyhow; the typed errors below are the ones that
//! cross component seams.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific pairing scenarios
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("Pairing engine unavailable: {message}")]
    EngineUnavailable { message: String },

    #[error("Invalid message: {reason}")]
    InvalidMessage { reason: String },

    #[error("Boost verification failed: {reason}")]
    BoostVerificationFailed { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}
