//! Cloneable front door to the engine task

use tokio::sync::{mpsc, oneshot};

use crate::connection::Outbound;
use crate::engine::command::{PairingCommand, PairingStats};
use crate::error::PairingError;
use crate::signal::SignalMessage;
use crate::transport::protocol::JoinRequest;
use crate::types::{ConnectionId, CountryCode, RoomId};

/// Sends commands to the engine. Commands from one handle are processed in
/// the order they were sent.
#[derive(Debug, Clone)]
pub struct PairingHandle {
    commands: mpsc::UnboundedSender<PairingCommand>,
}

impl PairingHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<PairingCommand>) -> Self {
        Self { commands }
    }

    pub fn connect(
        &self,
        connection_id: ConnectionId,
        outbound: Outbound,
        resolved_country: Option<CountryCode>,
    ) -> Result<(), PairingError> {
        self.send(PairingCommand::Connect {
            connection_id,
            outbound,
            resolved_country,
        })
    }

    pub fn join(&self, connection_id: ConnectionId, request: JoinRequest) -> Result<(), PairingError> {
        self.send(PairingCommand::Join {
            connection_id,
            request,
        })
    }

    pub fn next(
        &self,
        connection_id: ConnectionId,
        room_id: Option<RoomId>,
    ) -> Result<(), PairingError> {
        self.send(PairingCommand::Next {
            connection_id,
            room_id,
        })
    }

    pub fn disconnect(&self, connection_id: ConnectionId) -> Result<(), PairingError> {
        self.send(PairingCommand::Disconnect { connection_id })
    }

    pub fn signal(
        &self,
        connection_id: ConnectionId,
        message: SignalMessage,
    ) -> Result<(), PairingError> {
        self.send(PairingCommand::Signal {
            connection_id,
            message,
        })
    }

    pub fn broadcast_online_count(&self) -> Result<(), PairingError> {
        self.send(PairingCommand::BroadcastOnlineCount)
    }

    pub async fn stats(&self) -> Result<PairingStats, PairingError> {
        let (reply, response) = oneshot::channel();
        self.send(PairingCommand::Stats { reply })?;
        response.await.map_err(|_| unavailable("stats reply dropped"))
    }

    /// Stop the engine, cancelling every timer and dropping all state
    pub async fn shutdown(&self) -> Result<(), PairingError> {
        let (reply, response) = oneshot::channel();
        self.send(PairingCommand::Shutdown { reply })?;
        response.await.map_err(|_| unavailable("shutdown reply dropped"))
    }

    /// Whether the engine task has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: PairingCommand) -> Result<(), PairingError> {
        let name = command.name();
        self.commands
            .send(command)
            .map_err(|_| unavailable(&format!("engine stopped before {}", name)))
    }
}

fn unavailable(message: &str) -> PairingError {
    PairingError::EngineUnavailable {
        message: message.to_string(),
    }
}
