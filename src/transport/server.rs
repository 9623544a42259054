//! HTTP server: the WebSocket endpoint plus monitoring routes

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::connection::HeaderCountryResolver;
use crate::engine::PairingHandle;
use crate::metrics::{monitoring_routes, MetricsCollector};
use crate::service::health::HealthProbe;
use crate::transport::protocol::JoinLimits;
use crate::transport::websocket::websocket_handler;

/// Shared state for every HTTP handler
#[derive(Clone)]
pub struct HttpState {
    pub config: Arc<AppConfig>,
    pub pairing: PairingHandle,
    pub metrics: Arc<MetricsCollector>,
    pub probe: HealthProbe,
    pub country_resolver: HeaderCountryResolver,
    pub join_limits: JoinLimits,
}

impl HttpState {
    pub fn new(
        config: Arc<AppConfig>,
        pairing: PairingHandle,
        metrics: Arc<MetricsCollector>,
        is_running: Arc<RwLock<bool>>,
    ) -> Result<Self> {
        let country_resolver = HeaderCountryResolver::new(&config.service.country_header)?;
        let join_limits = JoinLimits::from(&config.matchmaking);
        let probe = HealthProbe::new(pairing.clone(), is_running);

        Ok(Self {
            config,
            pairing,
            metrics,
            probe,
            country_resolver,
            join_limits,
        })
    }
}

/// Build the full router
pub fn build_router(state: HttpState) -> Router {
    let cors = cors_layer(&state.config.service.allowed_origins);

    Router::new()
        .route("/ws", get(websocket_handler))
        .merge(monitoring_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Skipping invalid allowed origin '{}'", origin);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

/// The service's only HTTP listener
pub struct HttpServer {
    addr: String,
    router: Router,
    shutdown_tx: broadcast::Sender<()>,
}

impl HttpServer {
    pub fn new(state: HttpState) -> Self {
        let addr = format!(
            "{}:{}",
            state.config.service.host, state.config.service.http_port
        );
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            addr,
            router: build_router(state),
            shutdown_tx,
        }
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = self
            .addr
            .parse()
            .with_context(|| format!("Invalid listen address {}", self.addr))?;
        TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))
    }

    /// Bind and serve until [`HttpServer::stop`] is called
    pub async fn start(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("HTTP server listening on http://{}", local_addr);
        info!("WebSocket endpoint: ws://{}/ws", local_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP server shutdown signal received");
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    pub fn stop(&self) {
        info!("Stopping HTTP server...");
        if self.shutdown_tx.send(()).is_err() {
            warn!("HTTP server was not running");
        }
    }
}
