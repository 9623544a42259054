//! Connection registry: which connections are live, and how to reach them

use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::transport::protocol::ServerMessage;
use crate::types::{ConnectionId, CountryCode};

/// Outbound message channel of one connection
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

/// Read side of the live-connection set
pub trait ConnectionRegistry: Send + Sync {
    /// Whether the connection is still attached to the transport
    fn is_live(&self, connection_id: ConnectionId) -> bool;

    /// Queue a message for delivery; false if the connection is gone
    fn send(&self, connection_id: ConnectionId, message: ServerMessage) -> bool;

    /// Number of live connections
    fn live_count(&self) -> usize;
}

/// A registered connection
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub outbound: Outbound,
    pub resolved_country: Option<CountryCode>,
}

/// Live connections keyed by id.
///
/// An entry whose outbound channel has been closed by the transport counts as
/// stale even before its disconnect has been processed.
#[derive(Debug, Default)]
pub struct LiveConnections {
    entries: HashMap<ConnectionId, ConnectionEntry>,
}

impl LiveConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, replacing any previous entry with the same id
    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        outbound: Outbound,
        resolved_country: Option<CountryCode>,
    ) {
        let previous = self.entries.insert(
            connection_id,
            ConnectionEntry {
                outbound,
                resolved_country,
            },
        );
        if previous.is_some() {
            debug!("Connection {} re-registered", connection_id);
        }
    }

    pub fn unregister(&mut self, connection_id: ConnectionId) -> Option<ConnectionEntry> {
        self.entries.remove(&connection_id)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&ConnectionEntry> {
        self.entries.get(&connection_id)
    }

    /// Country the transport resolved for this connection
    pub fn resolved_country(&self, connection_id: ConnectionId) -> Option<CountryCode> {
        self.entries
            .get(&connection_id)
            .and_then(|entry| entry.resolved_country.clone())
    }

    /// Send a message to every live connection, returning how many accepted it
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.outbound.send(message.clone()).is_ok())
            .count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl ConnectionRegistry for LiveConnections {
    fn is_live(&self, connection_id: ConnectionId) -> bool {
        self.entries
            .get(&connection_id)
            .is_some_and(|entry| !entry.outbound.is_closed())
    }

    fn send(&self, connection_id: ConnectionId, message: ServerMessage) -> bool {
        match self.entries.get(&connection_id) {
            Some(entry) => entry.outbound.send(message).is_ok(),
            None => false,
        }
    }

    fn live_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.outbound.is_closed())
            .count()
    }
}
