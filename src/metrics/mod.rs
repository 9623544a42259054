//! Metrics and monitoring for the pairing-room service
//!
//! Prometheus collection plus the HTTP health, stats and metrics endpoints.

pub mod collector;
pub mod health;

pub use collector::{
    ConnectionMetrics, MatchmakingMetrics, MetricsCollector, PerformanceMetrics,
    RoomMetrics, ServiceMetrics,
};
pub use health::{monitoring_routes, render_metrics};
