//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the pairing-room service
//! using Prometheus metrics.

use crate::engine::PairingStats;
use crate::types::{CloseReason, MatchTrigger};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the pairing service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Connection and relay metrics
    connection_metrics: ConnectionMetrics,

    /// Queue and escalation metrics
    matchmaking_metrics: MatchmakingMetrics,

    /// Room lifecycle metrics
    room_metrics: RoomMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Connection and signaling metrics
#[derive(Clone)]
pub struct ConnectionMetrics {
    /// Connections currently attached
    pub live_connections: IntGauge,

    /// Total connections accepted
    pub connections_total: IntCounter,

    /// Connections refused at upgrade time
    pub connections_rejected_total: IntCounterVec,

    /// Frames that could not be parsed
    pub invalid_messages_total: IntCounter,

    /// Handshake messages forwarded to a peer
    pub signals_relayed_total: IntCounterVec,

    /// Handshake messages dropped
    pub signals_dropped_total: IntCounterVec,
}

/// Queue and escalation metrics
#[derive(Clone)]
pub struct MatchmakingMetrics {
    /// Participants currently queued
    pub queue_length: IntGauge,

    /// Escalation timers currently armed
    pub pending_escalations: IntGauge,

    /// Total join requests processed
    pub joins_total: IntCounter,

    /// Escalation firings by outcome
    pub escalations_total: IntCounterVec,

    /// Stale queue entries purged during scans
    pub stale_entries_purged_total: IntCounter,

    /// Boost verifications by outcome
    pub boost_verifications_total: IntCounterVec,

    /// Time spent queued before a match
    pub queue_wait_time_seconds: HistogramVec,
}

/// Room lifecycle metrics
#[derive(Clone)]
pub struct RoomMetrics {
    /// Rooms currently open
    pub active_rooms: IntGauge,

    /// Total rooms created
    pub rooms_created_total: IntCounterVec,

    /// Total rooms closed
    pub rooms_closed_total: IntCounterVec,

    /// How long rooms stayed open
    pub room_duration_seconds: Histogram,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Time the engine spends on one input
    pub event_processing_duration: HistogramVec,

    /// Boost verification round trip
    pub boost_verification_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let connection_metrics = ConnectionMetrics::new(&registry)?;
        let matchmaking_metrics = MatchmakingMetrics::new(&registry)?;
        let room_metrics = RoomMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            connection_metrics,
            matchmaking_metrics,
            room_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn connection(&self) -> &ConnectionMetrics {
        &self.connection_metrics
    }

    pub fn matchmaking(&self) -> &MatchmakingMetrics {
        &self.matchmaking_metrics
    }

    pub fn room(&self) -> &RoomMetrics {
        &self.room_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh the point-in-time gauges from engine stats
    pub fn update_from_stats(&self, stats: &PairingStats) {
        self.connection_metrics
            .live_connections
            .set(stats.live_connections as i64);
        self.matchmaking_metrics
            .queue_length
            .set(stats.queue_length as i64);
        self.matchmaking_metrics
            .pending_escalations
            .set(stats.pending_escalations as i64);
        self.room_metrics.active_rooms.set(stats.active_rooms as i64);
    }

    pub fn record_connection_opened(&self) {
        self.connection_metrics.connections_total.inc();
    }

    /// Record an upgrade refused before a connection existed
    pub fn record_connection_rejected(&self, reason: &str) {
        self.connection_metrics
            .connections_rejected_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_invalid_message(&self) {
        self.connection_metrics.invalid_messages_total.inc();
    }

    pub fn record_join(&self) {
        self.matchmaking_metrics.joins_total.inc();
    }

    /// Record a room being created, with how long each member waited
    pub fn record_room_created(&self, trigger: MatchTrigger, waits: &[Duration]) {
        let trigger = trigger.as_str();
        self.room_metrics
            .rooms_created_total
            .with_label_values(&[trigger])
            .inc();

        for wait in waits {
            self.matchmaking_metrics
                .queue_wait_time_seconds
                .with_label_values(&[trigger])
                .observe(wait.as_secs_f64());
        }
    }

    pub fn record_room_closed(&self, reason: CloseReason, lifetime: Duration) {
        self.room_metrics
            .rooms_closed_total
            .with_label_values(&[reason.as_str()])
            .inc();
        self.room_metrics
            .room_duration_seconds
            .observe(lifetime.as_secs_f64());
    }

    /// Record an escalation outcome: `matched`, `unmatched` or `stale`
    pub fn record_escalation(&self, outcome: &str) {
        self.matchmaking_metrics
            .escalations_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_stale_purged(&self, count: usize) {
        self.matchmaking_metrics
            .stale_entries_purged_total
            .inc_by(count as u64);
    }

    pub fn record_signal(&self, kind: &str, forwarded: bool) {
        let counter = if forwarded {
            &self.connection_metrics.signals_relayed_total
        } else {
            &self.connection_metrics.signals_dropped_total
        };
        counter.with_label_values(&[kind]).inc();
    }

    /// Record a boost verification outcome and its duration
    pub fn record_boost_verification(&self, outcome: &str, duration: Duration) {
        self.matchmaking_metrics
            .boost_verifications_total
            .with_label_values(&[outcome])
            .inc();
        self.performance_metrics
            .boost_verification_duration
            .observe(duration.as_secs_f64());
    }

    pub fn record_event_processing(&self, input: &str, duration: Duration) {
        self.performance_metrics
            .event_processing_duration
            .with_label_values(&[input])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("pairing_room_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "pairing_room_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("pairing_room_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl ConnectionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let live_connections = IntGauge::new(
            "pairing_room_live_connections",
            "Connections currently attached",
        )?;
        registry.register(Box::new(live_connections.clone()))?;

        let connections_total = IntCounter::new(
            "pairing_room_connections_total",
            "Total connections accepted",
        )?;
        registry.register(Box::new(connections_total.clone()))?;

        let connections_rejected_total = IntCounterVec::new(
            Opts::new(
                "pairing_room_connections_rejected_total",
                "Connections refused at upgrade",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(connections_rejected_total.clone()))?;

        let invalid_messages_total = IntCounter::new(
            "pairing_room_invalid_messages_total",
            "Frames that could not be parsed",
        )?;
        registry.register(Box::new(invalid_messages_total.clone()))?;

        let signals_relayed_total = IntCounterVec::new(
            Opts::new(
                "pairing_room_signals_relayed_total",
                "Handshake messages forwarded",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(signals_relayed_total.clone()))?;

        let signals_dropped_total = IntCounterVec::new(
            Opts::new(
                "pairing_room_signals_dropped_total",
                "Handshake messages dropped",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(signals_dropped_total.clone()))?;

        Ok(Self {
            live_connections,
            connections_total,
            connections_rejected_total,
            invalid_messages_total,
            signals_relayed_total,
            signals_dropped_total,
        })
    }
}

impl MatchmakingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let queue_length =
            IntGauge::new("pairing_room_queue_length", "Participants currently queued")?;
        registry.register(Box::new(queue_length.clone()))?;

        let pending_escalations = IntGauge::new(
            "pairing_room_pending_escalations",
            "Escalation timers currently armed",
        )?;
        registry.register(Box::new(pending_escalations.clone()))?;

        let joins_total = IntCounter::new("pairing_room_joins_total", "Total join requests")?;
        registry.register(Box::new(joins_total.clone()))?;

        let escalations_total = IntCounterVec::new(
            Opts::new(
                "pairing_room_escalations_total",
                "Escalation firings by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(escalations_total.clone()))?;

        let stale_entries_purged_total = IntCounter::new(
            "pairing_room_stale_entries_purged_total",
            "Stale queue entries purged",
        )?;
        registry.register(Box::new(stale_entries_purged_total.clone()))?;

        let boost_verifications_total = IntCounterVec::new(
            Opts::new(
                "pairing_room_boost_verifications_total",
                "Boost verifications by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(boost_verifications_total.clone()))?;

        let queue_wait_time_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pairing_room_queue_wait_time_seconds",
                "Time queued before a match",
            )
            .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
            &["trigger"],
        )?;
        registry.register(Box::new(queue_wait_time_seconds.clone()))?;

        Ok(Self {
            queue_length,
            pending_escalations,
            joins_total,
            escalations_total,
            stale_entries_purged_total,
            boost_verifications_total,
            queue_wait_time_seconds,
        })
    }
}

impl RoomMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_rooms = IntGauge::new("pairing_room_active_rooms", "Rooms currently open")?;
        registry.register(Box::new(active_rooms.clone()))?;

        let rooms_created_total = IntCounterVec::new(
            Opts::new("pairing_room_rooms_created_total", "Total rooms created"),
            &["trigger"],
        )?;
        registry.register(Box::new(rooms_created_total.clone()))?;

        let rooms_closed_total = IntCounterVec::new(
            Opts::new("pairing_room_rooms_closed_total", "Total rooms closed"),
            &["reason"],
        )?;
        registry.register(Box::new(rooms_closed_total.clone()))?;

        let room_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("pairing_room_room_duration_seconds", "Room lifetime")
                .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
        )?;
        registry.register(Box::new(room_duration_seconds.clone()))?;

        Ok(Self {
            active_rooms,
            rooms_created_total,
            rooms_closed_total,
            room_duration_seconds,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let event_processing_duration = HistogramVec::new(
            HistogramOpts::new(
                "pairing_room_event_processing_duration_seconds",
                "Engine time per input",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["input"],
        )?;
        registry.register(Box::new(event_processing_duration.clone()))?;

        let boost_verification_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pairing_room_boost_verification_duration_seconds",
                "Boost verification round trip",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 3.0, 5.0]),
        )?;
        registry.register(Box::new(boost_verification_duration.clone()))?;

        Ok(Self {
            event_processing_duration,
            boost_verification_duration,
        })
    }
}
