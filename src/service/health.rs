//! Health checks and probes
//!
//! This module provides health check functionality for the pairing-room
//! service, including readiness and liveness probes.

use crate::engine::{PairingHandle, PairingStats};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// How long the engine may take to answer a probe
const ENGINE_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// What the health checks look at
#[derive(Debug, Clone)]
pub struct HealthProbe {
    pairing: PairingHandle,
    is_running: Arc<RwLock<bool>>,
}

impl HealthProbe {
    pub fn new(pairing: PairingHandle, is_running: Arc<RwLock<bool>>) -> Self {
        Self {
            pairing,
            is_running,
        }
    }

    pub fn pairing(&self) -> &PairingHandle {
        &self.pairing
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Ask the engine for stats, bounded by a short timeout
    pub async fn engine_stats(&self) -> Result<PairingStats> {
        let stats = tokio::time::timeout(ENGINE_PROBE_TIMEOUT, self.pairing.stats())
            .await
            .map_err(|_| anyhow::anyhow!("Pairing engine did not answer in time"))??;
        Ok(stats)
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Engine statistics, when the engine answered
    pub stats: Option<PairingStats>,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(probe: &HealthProbe, service_name: &str) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(probe).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        let (engine_check, stats) = Self::check_pairing_engine(probe).await;
        if engine_check.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        } else if engine_check.status == HealthStatus::Degraded
            && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        checks.push(engine_check);

        Ok(HealthCheck {
            status: overall_status,
            service: service_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - the service is running and the engine task
    /// has not stopped
    pub async fn liveness_check(probe: &HealthProbe) -> Result<HealthStatus> {
        if probe.is_running().await && !probe.pairing().is_closed() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - the engine answers requests
    pub async fn readiness_check(probe: &HealthProbe) -> Result<HealthStatus> {
        if !probe.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_pairing_engine(probe).await.0.status)
    }

    async fn check_service_running(probe: &HealthProbe) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if probe.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn check_pairing_engine(probe: &HealthProbe) -> (ComponentCheck, Option<PairingStats>) {
        let start = std::time::Instant::now();

        let (status, message, stats) = match probe.engine_stats().await {
            Ok(stats) => {
                debug!("Engine answered health probe: {:?}", stats);
                (HealthStatus::Healthy, None, Some(stats))
            }
            Err(e) => {
                error!("Pairing engine health probe failed: {}", e);
                (HealthStatus::Unhealthy, Some(e.to_string()), None)
            }
        };

        let check = ComponentCheck {
            name: "pairing_engine".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        (check, stats)
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
