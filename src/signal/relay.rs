//! Stateless forwarding of handshake messages between room members

use serde_json::Value;
use tracing::debug;

use crate::connection::ConnectionRegistry;
use crate::room::RoomManager;
use crate::transport::protocol::ServerMessage;
use crate::types::{ConnectionId, RoomId};

/// Kind of handshake message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    /// Parse the wire `type` discriminator
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "offer" => Some(SignalKind::Offer),
            "answer" => Some(SignalKind::Answer),
            "ice-candidate" => Some(SignalKind::IceCandidate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }

    /// Name of the field carrying the payload on the wire
    pub fn payload_field(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "candidate",
        }
    }
}

/// A handshake message as received from one room member
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMessage {
    pub kind: SignalKind,
    pub room_id: RoomId,
    pub payload: Value,
}

/// Result of a relay attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Forwarded to the given peer
    Forwarded(ConnectionId),
    /// Sender is not a member of the named room, or the room is gone
    Dropped,
}

/// Forwards handshake messages to the other member of the sender's room.
///
/// Delivery is best effort: a message naming a room the sender does not
/// belong to is dropped without telling the sender.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalRelay;

impl SignalRelay {
    pub fn new() -> Self {
        Self
    }

    pub fn relay(
        &self,
        sender: ConnectionId,
        message: SignalMessage,
        rooms: &RoomManager,
        outbound: &dyn ConnectionRegistry,
    ) -> RelayOutcome {
        let Some(peer) = rooms.get_peer(sender, &message.room_id) else {
            debug!(
                "Dropping {} from {} - not a member of room {}",
                message.kind.as_str(),
                sender,
                message.room_id
            );
            return RelayOutcome::Dropped;
        };

        let kind = message.kind;
        let forwarded = ServerMessage::signal(kind, message.room_id, message.payload);

        if outbound.send(peer, forwarded) {
            debug!("Relayed {} from {} to {}", kind.as_str(), sender, peer);
            RelayOutcome::Forwarded(peer)
        } else {
            debug!(
                "Dropping {} from {} - peer {} is gone",
                kind.as_str(),
                sender,
                peer
            );
            RelayOutcome::Dropped
        }
    }
}
