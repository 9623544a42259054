//! Test fixtures and fake connections for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use pairing_room::boost::{BoostDecision, BoostVerifier, DisabledBoostVerifier};
use pairing_room::config::AppConfig;
use pairing_room::engine::{PairingHandle, PairingService};
use pairing_room::error::Result;
use pairing_room::transport::{JoinLimits, JoinRequest, ServerMessage};
use pairing_room::types::{ConnectionId, CountryCode, RoomId};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use uuid::Uuid;

/// Spawn an engine with boost verification disabled
pub fn spawn_engine() -> (PairingHandle, JoinHandle<()>) {
    spawn_engine_with(AppConfig::default(), Arc::new(DisabledBoostVerifier))
}

pub fn spawn_engine_with(
    config: AppConfig,
    verifier: Arc<dyn BoostVerifier>,
) -> (PairingHandle, JoinHandle<()>) {
    PairingService::spawn(&config, verifier, None)
}

/// Build a join request the same way a wire frame would be parsed
pub fn join_request(fields: Value) -> JoinRequest {
    JoinRequest::from_value(&fields, Uuid::new_v4(), &JoinLimits::default())
}

/// A join with no preferences and a long wait, so escalation stays out of
/// the way unless a test asks for it
pub fn plain_join(session: &str) -> JoinRequest {
    join_request(json!({ "sessionId": session, "maxWait": 600 }))
}

/// A registered connection whose outbound frames the test can inspect
pub struct FakeConnection {
    pub id: ConnectionId,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl FakeConnection {
    /// Register a new connection, optionally with an edge-resolved country
    pub fn connect(handle: &PairingHandle, country: Option<&str>) -> Self {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        handle
            .connect(id, tx, country.and_then(CountryCode::parse))
            .unwrap();
        Self { id, rx }
    }

    /// Everything delivered so far, without the online count greeting
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            if !matches!(message, ServerMessage::OnlineCount { .. }) {
                messages.push(message);
            }
        }
        messages
    }

    /// Wait for the next frame that is not an online count
    pub async fn next_message(&mut self) -> ServerMessage {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(120), self.rx.recv())
                .await
                .expect("timed out waiting for a server message")
                .expect("outbound channel closed");
            if !matches!(message, ServerMessage::OnlineCount { .. }) {
                return message;
            }
        }
    }

    /// Room id and initiator flag from a matched frame
    pub async fn expect_matched(&mut self) -> (RoomId, bool) {
        match self.next_message().await {
            ServerMessage::Matched {
                room_id, initiator, ..
            } => (room_id, initiator),
            other => panic!("expected matched, got {:?}", other),
        }
    }

    pub async fn expect_waiting(&mut self) {
        assert_eq!(self.next_message().await, ServerMessage::Waiting);
    }

    /// Simulate the socket going away without a disconnect reaching the engine
    pub fn drop_socket(self) -> ConnectionId {
        self.id
    }
}

/// Wait until every command sent so far on `handle` has been processed
pub async fn settle(handle: &PairingHandle) {
    handle.stats().await.unwrap();
}

/// Verifier that answers after a delay
pub struct SlowBoostVerifier {
    pub delay: Duration,
    pub decision: BoostDecision,
}

#[async_trait]
impl BoostVerifier for SlowBoostVerifier {
    async fn verify(&self, _token: &str) -> Result<BoostDecision> {
        tokio::time::sleep(self.delay).await;
        Ok(self.decision.clone())
    }
}
