//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! pairing-room service, including environment variable and TOML loading
//! and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
    pub boost: BoostSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Interface to bind the HTTP/WebSocket server to
    pub host: String,
    /// Port for the HTTP/WebSocket server
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Origins allowed to open sockets and call the HTTP API; empty allows all
    pub allowed_origins: Vec<String>,
    /// Bearer secret protecting `/stats`; unset leaves it open
    pub stats_secret: Option<String>,
    /// Request header carrying the proxy-resolved client country
    pub country_header: String,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Wait before the country filter is relaxed when a join omits `maxWait`
    pub default_max_wait_seconds: u64,
    /// Maximum number of interests kept per join
    pub max_interests: usize,
    /// Interval between `online-count` broadcasts
    pub online_count_interval_seconds: u64,
}

/// Boost verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostSettings {
    /// Boost session record endpoint; verification is disabled when unset
    pub verify_url: Option<String>,
    /// API key sent with record lookups
    pub api_key: Option<String>,
    /// Upper bound on a single verification, in milliseconds
    pub timeout_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "pairing-room".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            http_port: 3001,
            shutdown_timeout_seconds: 10,
            allowed_origins: Vec::new(),
            stats_secret: None,
            country_header: "cf-ipcountry".to_string(),
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            default_max_wait_seconds: 5,
            max_interests: 5,
            online_count_interval_seconds: 10,
        }
    }
}

impl Default for BoostSettings {
    fn default() -> Self {
        Self {
            verify_url: None,
            api_key: None,
            timeout_ms: 3000,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HOST") {
            config.service.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            config.service.http_port = parse_var("PORT", &port)?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds =
                parse_var("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }
        if let Ok(origins) = env::var("ALLOWED_ORIGINS") {
            config.service.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(secret) = env::var("STATS_SECRET") {
            config.service.stats_secret = non_empty(secret);
        }
        if let Ok(header) = env::var("COUNTRY_HEADER") {
            config.service.country_header = header.trim().to_ascii_lowercase();
        }

        // Matchmaking settings
        if let Ok(wait) = env::var("DEFAULT_MAX_WAIT_SECONDS") {
            config.matchmaking.default_max_wait_seconds =
                parse_var("DEFAULT_MAX_WAIT_SECONDS", &wait)?;
        }
        if let Ok(max) = env::var("MAX_INTERESTS") {
            config.matchmaking.max_interests = parse_var("MAX_INTERESTS", &max)?;
        }
        if let Ok(interval) = env::var("ONLINE_COUNT_INTERVAL_SECONDS") {
            config.matchmaking.online_count_interval_seconds =
                parse_var("ONLINE_COUNT_INTERVAL_SECONDS", &interval)?;
        }

        // Boost settings
        if let Ok(url) = env::var("BOOST_VERIFY_URL") {
            config.boost.verify_url = non_empty(url);
        }
        if let Ok(key) = env::var("BOOST_API_KEY") {
            config.boost.api_key = non_empty(key);
        }
        if let Ok(timeout) = env::var("BOOST_TIMEOUT_MS") {
            config.boost.timeout_ms = parse_var("BOOST_TIMEOUT_MS", &timeout)?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&raw)?;
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(raw).context("Failed to parse TOML config")?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get boost verification timeout as Duration
    pub fn boost_timeout(&self) -> Duration {
        Duration::from_millis(self.boost.timeout_ms)
    }

    /// Get online count broadcast interval as Duration
    pub fn online_count_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking.online_count_interval_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.country_header.trim().is_empty() {
        return Err(anyhow!("Country header name cannot be empty"));
    }

    if config.matchmaking.default_max_wait_seconds == 0 {
        return Err(anyhow!("Default max wait must be greater than 0"));
    }
    if config.matchmaking.max_interests == 0 {
        return Err(anyhow!("Max interests must be greater than 0"));
    }
    if config.matchmaking.online_count_interval_seconds == 0 {
        return Err(anyhow!("Online count interval must be greater than 0"));
    }

    if config.boost.timeout_ms == 0 {
        return Err(anyhow!("Boost timeout must be greater than 0"));
    }
    if let Some(url) = &config.boost.verify_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!("Boost verify URL must be http(s): {}", url));
        }
    }

    Ok(())
}
