//! Inputs accepted by the engine and the stats it reports

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::connection::Outbound;
use crate::signal::SignalMessage;
use crate::transport::protocol::JoinRequest;
use crate::types::{ConnectionId, CountryCode, Gender, RoomId};

/// Commands sent through a [`PairingHandle`](crate::engine::PairingHandle)
#[derive(Debug)]
pub enum PairingCommand {
    /// A transport connection was accepted
    Connect {
        connection_id: ConnectionId,
        outbound: Outbound,
        resolved_country: Option<CountryCode>,
    },
    Join {
        connection_id: ConnectionId,
        request: JoinRequest,
    },
    /// Leave the current room; `room_id` is informational only
    Next {
        connection_id: ConnectionId,
        room_id: Option<RoomId>,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    Signal {
        connection_id: ConnectionId,
        message: SignalMessage,
    },
    BroadcastOnlineCount,
    Stats {
        reply: oneshot::Sender<PairingStats>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

impl PairingCommand {
    /// Short name used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            PairingCommand::Connect { .. } => "connect",
            PairingCommand::Join { .. } => "join",
            PairingCommand::Next { .. } => "next",
            PairingCommand::Disconnect { .. } => "disconnect",
            PairingCommand::Signal { .. } => "signal",
            PairingCommand::BroadcastOnlineCount => "online_count",
            PairingCommand::Stats { .. } => "stats",
            PairingCommand::Shutdown { .. } => "shutdown",
        }
    }
}

/// Result of a boost check as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoostOutcome {
    Granted(Gender),
    Rejected(String),
    Failed(String),
    TimedOut,
}

impl BoostOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoostOutcome::Granted(_) => "granted",
            BoostOutcome::Rejected(_) => "rejected",
            BoostOutcome::Failed(_) => "error",
            BoostOutcome::TimedOut => "timeout",
        }
    }

    pub fn granted_gender(&self) -> Option<Gender> {
        match self {
            BoostOutcome::Granted(gender) => Some(*gender),
            _ => None,
        }
    }
}

/// A boost verification that finished for a pending join
#[derive(Debug)]
pub struct BoostSettled {
    pub connection_id: ConnectionId,
    /// Join generation the verification was started for
    pub generation: u64,
    pub request: JoinRequest,
    pub outcome: BoostOutcome,
    pub elapsed: Duration,
}

/// Snapshot of engine state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingStats {
    pub queue_length: usize,
    pub active_rooms: usize,
    pub live_connections: usize,
    pub pending_escalations: usize,
    pub rooms_created: u64,
    pub escalations_fired: u64,
}
