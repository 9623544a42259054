//! Country resolution for incoming connections
//!
//! The fronting proxy geolocates the client address and forwards the result
//! in a request header; the service only reads it.

use anyhow::{anyhow, Result};
use axum::http::{HeaderMap, HeaderName};

use crate::types::CountryCode;

/// Codes proxies use for "unknown" and "Tor exit"
const UNRESOLVED_CODES: [&str; 2] = ["XX", "T1"];

/// Resolves a connection's country from a proxy header
#[derive(Debug, Clone)]
pub struct HeaderCountryResolver {
    header: HeaderName,
}

impl HeaderCountryResolver {
    pub fn new(header: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(header.trim().to_ascii_lowercase().as_bytes())
            .map_err(|e| anyhow!("Invalid country header name '{}': {}", header, e))?;
        Ok(Self { header })
    }

    pub fn resolve(&self, headers: &HeaderMap) -> Option<CountryCode> {
        let raw = headers.get(&self.header)?.to_str().ok()?;
        let code = CountryCode::parse(raw)?;
        if UNRESOLVED_CODES.contains(&code.as_str()) {
            None
        } else {
            Some(code)
        }
    }
}

impl Default for HeaderCountryResolver {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static("cf-ipcountry"),
        }
    }
}
