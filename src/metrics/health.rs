//! Health check, stats and Prometheus endpoints
//!
//! These routes are mounted on the same axum server as the WebSocket
//! endpoint.

use crate::metrics::collector::MetricsCollector;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::transport::server::HttpState;
use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, error, warn};

/// Monitoring routes, to be merged into the main router
pub fn monitoring_routes() -> Router<HttpState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/alive", get(alive_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<HttpState>) -> impl IntoResponse {
    Json(json!({
        "service": state.config.service.name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/ws",
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats"
        ]
    }))
}

/// Lightweight health check: reports the online count
async fn health_handler(State(state): State<HttpState>) -> impl IntoResponse {
    debug!("Health check requested");

    match state.probe.engine_stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "onlineCount": stats.live_connections
            })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint handler
async fn ready_handler(State(state): State<HttpState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match HealthCheck::readiness_check(&state.probe).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
        Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
        Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
        }
    }
}

/// Liveness check endpoint handler
async fn alive_handler(State(state): State<HttpState>) -> impl IntoResponse {
    debug!("Liveness check requested");

    match HealthCheck::liveness_check(&state.probe).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<HttpState>) -> Response {
    debug!("Metrics endpoint requested");

    match render_metrics(&state.metrics) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

/// Engine statistics for the monitoring dashboard
async fn stats_handler(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    debug!("Stats endpoint requested");

    if !stats_authorized(state.config.service.stats_secret.as_deref(), &headers) {
        warn!("Rejected unauthorized stats request");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response();
    }

    match HealthCheck::check(&state.probe, &state.config.service.name).await {
        Ok(health) => {
            let mut body = json!({
                "status": "ok",
                "service": health.service,
                "version": health.version,
                "health": health.status,
                "components": health.checks,
                "timestamp": health.timestamp,
            });
            if let (Some(stats), Some(fields)) = (health.stats, body.as_object_mut()) {
                if let Ok(serde_json::Value::Object(stats)) = serde_json::to_value(stats) {
                    fields.extend(stats);
                }
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            error!("Failed to get stats: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "error": "Failed to get service stats",
                })),
            )
                .into_response()
        }
    }
}

/// With a secret configured, require `Authorization: Bearer <secret>`
fn stats_authorized(secret: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(secret) = secret else {
        return true;
    };

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim().as_bytes().ct_eq(secret.as_bytes()).into())
}

/// Render every registered metric in Prometheus text format
pub fn render_metrics(collector: &MetricsCollector) -> Result<String> {
    let metric_families = collector.registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Metrics are not UTF-8: {}", e))
}
