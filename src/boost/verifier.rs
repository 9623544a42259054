//! Boost verifier trait and the in-process implementations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::boost::record::RecordBoostVerifier;
use crate::config::BoostSettings;
use crate::error::Result;
use crate::types::Gender;
use crate::utils::current_timestamp;

/// Verdict on a boost token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoostDecision {
    /// The token is valid and pins the partner gender
    Granted {
        want_gender: Gender,
        expires_at: DateTime<Utc>,
    },
    /// The token is unknown, expired or malformed
    Rejected { reason: String },
}

impl BoostDecision {
    pub fn rejected(reason: impl Into<String>) -> Self {
        BoostDecision::Rejected {
            reason: reason.into(),
        }
    }

    /// Gender the boost pins, if granted
    pub fn granted_gender(&self) -> Option<Gender> {
        match self {
            BoostDecision::Granted { want_gender, .. } => Some(*want_gender),
            BoostDecision::Rejected { .. } => None,
        }
    }
}

/// Trait for boost token verification services
#[async_trait]
pub trait BoostVerifier: Send + Sync {
    /// Check a token. An `Err` means the check itself could not be made.
    async fn verify(&self, token: &str) -> Result<BoostDecision>;
}

/// Verifier backed by a fixed token table
#[derive(Debug, Default, Clone)]
pub struct StaticBoostVerifier {
    grants: HashMap<String, (Gender, DateTime<Utc>)>,
}

impl StaticBoostVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token granting `want_gender` until `expires_at`
    pub fn with_grant(
        mut self,
        token: impl Into<String>,
        want_gender: Gender,
        expires_at: DateTime<Utc>,
    ) -> Self {
        self.grants.insert(token.into(), (want_gender, expires_at));
        self
    }
}

#[async_trait]
impl BoostVerifier for StaticBoostVerifier {
    async fn verify(&self, token: &str) -> Result<BoostDecision> {
        let decision = match self.grants.get(token) {
            None => BoostDecision::rejected("unknown token"),
            Some((_, expires_at)) if *expires_at <= current_timestamp() => {
                BoostDecision::rejected("expired")
            }
            Some((want_gender, expires_at)) => BoostDecision::Granted {
                want_gender: *want_gender,
                expires_at: *expires_at,
            },
        };
        debug!("Static boost check: {:?}", decision);
        Ok(decision)
    }
}

/// Verifier used when no record store is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBoostVerifier;

#[async_trait]
impl BoostVerifier for DisabledBoostVerifier {
    async fn verify(&self, _token: &str) -> Result<BoostDecision> {
        Ok(BoostDecision::rejected("boost verification disabled"))
    }
}

/// Pick the verifier matching the configuration
pub fn build_verifier(settings: &BoostSettings) -> Result<Arc<dyn BoostVerifier>> {
    match &settings.verify_url {
        Some(url) => {
            info!("Boost verification against {}", url);
            Ok(Arc::new(RecordBoostVerifier::new(settings)?))
        }
        None => {
            info!("Boost verification disabled");
            Ok(Arc::new(DisabledBoostVerifier))
        }
    }
}
