//! Boost verifier backed by the boost-session record store
//!
//! The store exposes a PostgREST-style endpoint: rows are filtered with
//! `column=eq.value` query parameters and returned as a JSON array.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::boost::verifier::{BoostDecision, BoostVerifier};
use crate::config::BoostSettings;
use crate::error::{PairingError, Result};
use crate::types::Gender;
use crate::utils::current_timestamp;

/// One boost-session row as returned by the store
#[derive(Debug, Clone, Deserialize)]
pub struct BoostRecord {
    pub want_gender: Option<String>,
    pub expires_at: Option<String>,
}

/// Looks boost tokens up over HTTP
#[derive(Debug, Clone)]
pub struct RecordBoostVerifier {
    client: Client,
    verify_url: String,
    api_key: Option<String>,
}

impl RecordBoostVerifier {
    pub fn new(settings: &BoostSettings) -> Result<Self> {
        let verify_url = settings
            .verify_url
            .clone()
            .ok_or_else(|| PairingError::ConfigurationError {
                message: "boost verify_url is not set".to_string(),
            })?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(settings.timeout_ms))
            .build()
            .context("Failed to build boost HTTP client")?;

        Ok(Self {
            client,
            verify_url,
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl BoostVerifier for RecordBoostVerifier {
    async fn verify(&self, token: &str) -> Result<BoostDecision> {
        let mut request = self.client.get(&self.verify_url).query(&[
            ("session_token", format!("eq.{}", token)),
            ("select", "want_gender,expires_at".to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PairingError::BoostVerificationFailed {
                reason: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| PairingError::BoostVerificationFailed {
                reason: e.to_string(),
            })?;

        let rows: Vec<BoostRecord> =
            response
                .json()
                .await
                .map_err(|e| PairingError::BoostVerificationFailed {
                    reason: format!("unreadable record: {}", e),
                })?;

        let decision = evaluate_records(&rows, current_timestamp());
        debug!("Boost record lookup returned {} row(s): {:?}", rows.len(), decision);
        Ok(decision)
    }
}

/// Decide on a token from the rows the store returned for it
pub fn evaluate_records(rows: &[BoostRecord], now: DateTime<Utc>) -> BoostDecision {
    let Some(record) = rows.first() else {
        return BoostDecision::rejected("unknown token");
    };

    let Some(expires_at) = record.expires_at.as_deref().and_then(parse_timestamp) else {
        return BoostDecision::rejected("missing or unreadable expiry");
    };
    if expires_at <= now {
        return BoostDecision::rejected("expired");
    }

    match record.want_gender.as_deref().and_then(Gender::parse) {
        Some(want_gender) => BoostDecision::Granted {
            want_gender,
            expires_at,
        },
        None => BoostDecision::rejected("unreadable gender"),
    }
}

/// Timestamps come back either with an offset or as naive UTC
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
