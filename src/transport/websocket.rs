//! WebSocket endpoint
//!
//! Each socket is split in two: a pusher task drains the connection's
//! outbound channel into the socket, and the receive loop turns inbound
//! frames into engine commands. When either side ends, the other is aborted
//! and the engine is told the connection is gone.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::engine::PairingHandle;
use crate::error::PairingError;
use crate::metrics::MetricsCollector;
use crate::transport::protocol::{ClientMessage, JoinLimits, ServerMessage};
use crate::transport::server::HttpState;
use crate::types::{ConnectionId, CountryCode};
use crate::utils::generate_connection_id;

/// Upgrade handler. The origin is checked before the upgrade request
/// itself is validated.
pub async fn websocket_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> Response {
    if !origin_allowed(&state.config.service.allowed_origins, &headers) {
        warn!(
            "Rejecting WebSocket upgrade from origin {:?}",
            headers.get(header::ORIGIN)
        );
        state.metrics.record_connection_rejected("origin");
        return StatusCode::FORBIDDEN.into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let resolved_country = state.country_resolver.resolve(&headers);
    ws.on_upgrade(move |socket| handle_socket(socket, state, resolved_country))
}

/// With an allow-list configured, a request carrying an `Origin` header must
/// name one of the listed origins
pub fn origin_allowed(allowed_origins: &[String], headers: &HeaderMap) -> bool {
    if allowed_origins.is_empty() {
        return true;
    }

    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };
    let Ok(origin) = origin.to_str() else {
        return false;
    };

    let origin = origin.trim_end_matches('/');
    allowed_origins
        .iter()
        .any(|allowed| allowed == "*" || allowed.trim_end_matches('/') == origin)
}

/// Push queued server messages to the socket until the channel closes or a
/// write fails
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
    mut sender: SplitSink<WebSocket, Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode {} message: {}", message.kind(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    })
}

async fn handle_socket(
    socket: WebSocket,
    state: HttpState,
    resolved_country: Option<CountryCode>,
) {
    let connection_id = generate_connection_id();
    let (tx, rx) = mpsc::unbounded_channel();

    if let Err(e) = state.pairing.connect(connection_id, tx, resolved_country) {
        error!("Cannot register connection {}: {}", connection_id, e);
        return;
    }

    let (sender, mut receiver) = socket.split();

    let pairing = state.pairing.clone();
    let limits = state.join_limits.clone();
    let metrics = state.metrics.clone();

    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    debug!("WebSocket error on {}: {}", connection_id, e);
                    break;
                }
            };

            match frame {
                Message::Text(text) => {
                    if let Err(e) =
                        dispatch(&pairing, connection_id, text.as_str(), &limits, &metrics)
                    {
                        error!("Dropping connection {}: {}", connection_id, e);
                        break;
                    }
                }
                Message::Close(_) => {
                    debug!("Connection {} requested close", connection_id);
                    break;
                }
                // Ping/pong is answered by the protocol layer
                _ => {}
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender);

    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    if let Err(e) = state.pairing.disconnect(connection_id) {
        debug!("Disconnect of {} not delivered: {}", connection_id, e);
    }
}

/// Turn one text frame into an engine command. Unparseable frames are
/// logged and skipped; only a stopped engine is an error.
fn dispatch(
    pairing: &PairingHandle,
    connection_id: ConnectionId,
    text: &str,
    limits: &JoinLimits,
    metrics: &MetricsCollector,
) -> Result<(), PairingError> {
    match ClientMessage::parse(text, connection_id, limits) {
        Ok(ClientMessage::Join(request)) => pairing.join(connection_id, request),
        Ok(ClientMessage::Signal(message)) => pairing.signal(connection_id, message),
        Ok(ClientMessage::Next { room_id }) => pairing.next(connection_id, room_id),
        Err(e) => {
            warn!("Ignoring frame from {}: {}", connection_id, e);
            metrics.record_invalid_message();
            Ok(())
        }
    }
}
