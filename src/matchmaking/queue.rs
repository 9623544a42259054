//! Ordered, duplicate-free wait queue

use crate::types::{ConnectionId, Participant};

/// Participants awaiting a pairing, in arrival order.
///
/// A connection id appears at most once.
#[derive(Debug, Default, Clone)]
pub struct WaitQueue {
    entries: Vec<Participant>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a participant. A previous entry for the same connection is
    /// dropped first and returned.
    pub fn enqueue(&mut self, participant: Participant) -> Option<Participant> {
        let previous = self.remove(participant.connection_id);
        self.entries.push(participant);
        previous
    }

    /// Remove a participant; a no-op when absent
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<Participant> {
        let index = self.position(connection_id)?;
        Some(self.entries.remove(index))
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.position(connection_id).is_some()
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&Participant> {
        self.entries
            .iter()
            .find(|p| p.connection_id == connection_id)
    }

    pub fn position(&self, connection_id: ConnectionId) -> Option<usize> {
        self.entries
            .iter()
            .position(|p| p.connection_id == connection_id)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
