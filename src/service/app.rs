//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the pairing
//! engine, the HTTP server and the background tasks together.

use crate::boost::{build_verifier, BoostVerifier};
use crate::config::AppConfig;
use crate::engine::{PairingHandle, PairingService};
use crate::metrics::MetricsCollector;
use crate::transport::server::{HttpServer, HttpState};
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("HTTP server error: {message}")]
    Server { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: Arc<AppConfig>,

    /// Front door to the pairing engine
    pairing: PairingHandle,

    /// Engine task
    engine_task: Option<JoinHandle<()>>,

    /// Metrics collector shared with the engine and HTTP handlers
    metrics_collector: Arc<MetricsCollector>,

    /// HTTP server (WebSocket + monitoring)
    http_server: Arc<HttpServer>,

    /// HTTP server task
    server_task: Option<JoinHandle<()>>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let boost_verifier =
            build_verifier(&config.boost).map_err(|e| ServiceError::Configuration {
                message: format!("Failed to set up boost verification: {}", e),
            })?;
        Self::with_boost_verifier(config, boost_verifier).await
    }

    /// Initialize with an explicit boost verifier
    pub async fn with_boost_verifier(
        config: AppConfig,
        boost_verifier: Arc<dyn BoostVerifier>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing pairing-room service");
        info!(
            "Configuration: service={}, listen={}:{}, boost={}",
            config.service.name,
            config.service.host,
            config.service.http_port,
            if config.boost.verify_url.is_some() {
                "enabled"
            } else {
                "disabled"
            }
        );

        let config = Arc::new(config);

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let (pairing, engine_task) =
            PairingService::spawn(&config, boost_verifier, Some(metrics_collector.clone()));

        let is_running = Arc::new(RwLock::new(false));

        let http_state = HttpState::new(
            config.clone(),
            pairing.clone(),
            metrics_collector.clone(),
            is_running.clone(),
        )
        .map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;
        let http_server = Arc::new(HttpServer::new(http_state));

        Ok(Self {
            config,
            pairing,
            engine_task: Some(engine_task),
            metrics_collector,
            http_server,
            server_task: None,
            background_tasks: Vec::new(),
            is_running,
        })
    }

    /// Bind the listener and start serving and background work
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting pairing-room service");

        let listener = self
            .http_server
            .bind()
            .await
            .map_err(|e| ServiceError::Server {
                message: e.to_string(),
            })?;

        *self.is_running.write().await = true;

        let server = self.http_server.clone();
        self.server_task = Some(tokio::spawn(async move {
            if let Err(e) = server.serve(listener).await {
                error!("HTTP server failed: {}", e);
            }
        }));

        self.start_background_tasks();

        info!("✅ Pairing-room service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of pairing-room service");

        *self.is_running.write().await = false;

        self.http_server.stop();
        self.stop_background_tasks();

        let final_stats = self.pairing.stats().await.ok();

        // Dropping every outbound channel closes the open sockets
        if let Err(e) = self.pairing.shutdown().await {
            warn!("Pairing engine already stopped: {}", e);
        }
        if let Some(task) = self.engine_task.take() {
            if let Err(e) = task.await {
                warn!("Pairing engine task ended abnormally: {}", e);
            }
        }

        if let Some(task) = self.server_task.take() {
            let timeout = self.config.shutdown_timeout();
            let abort = task.abort_handle();
            if tokio::time::timeout(timeout, task).await.is_err() {
                warn!(
                    "HTTP server did not stop within {}s, aborting",
                    timeout.as_secs()
                );
                abort.abort();
            }
        }

        match final_stats {
            Some(stats) => info!("Final service statistics: {:?}", stats),
            None => warn!("Final statistics unavailable"),
        }
        info!("✅ Pairing-room service shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn pairing(&self) -> PairingHandle {
        self.pairing.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Start background maintenance tasks
    fn start_background_tasks(&mut self) {
        let online_count_interval = self.config.online_count_interval();
        info!(
            "Starting online count broadcast task ({}s interval)...",
            online_count_interval.as_secs()
        );
        let online_count_task = {
            let pairing = self.pairing.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(online_count_interval);
                // The first tick completes immediately
                interval.tick().await;

                while *is_running.read().await {
                    interval.tick().await;

                    if let Err(e) = pairing.broadcast_online_count() {
                        warn!("Online count broadcast failed: {}", e);
                        break;
                    }
                }

                info!("Online count task stopped");
            })
        };

        info!("Starting health metrics task (60s interval)...");
        let health_metrics_task = {
            let metrics_collector = self.metrics_collector.clone();
            let pairing = self.pairing.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                let start_time = tokio::time::Instant::now();

                while *is_running.read().await {
                    interval.tick().await;

                    let uptime_seconds = start_time.elapsed().as_secs() as i64;
                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(uptime_seconds);

                    let engine_healthy = !pairing.is_closed();
                    metrics_collector.update_health_status(if engine_healthy { 2 } else { 0 });
                    metrics_collector.update_component_health("pairing_engine", engine_healthy);
                    metrics_collector.update_component_health("http_server", true);

                    debug!(
                        "Updated service health metrics - uptime: {}s",
                        uptime_seconds
                    );
                }

                info!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(online_count_task);
        self.background_tasks.push(health_metrics_task);

        info!(
            "{} background maintenance tasks started successfully",
            self.background_tasks.len()
        );
    }

    /// Stop all background tasks
    fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }
    }
}
