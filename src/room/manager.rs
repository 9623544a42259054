//! Active pairings and the notifications that go with them
//!
//! The manager is plain state owned by the engine task. Every operation is a
//! single synchronous step, so a room is never observable half-built.

use std::collections::HashMap;
use tracing::{debug, info};

use crate::connection::ConnectionRegistry;
use crate::matchmaking::WaitPool;
use crate::transport::protocol::ServerMessage;
use crate::types::{ConnectionId, Participant, Room, RoomId};
use crate::utils::{common_interests, current_timestamp, generate_room_id};

/// Owner of all active rooms
#[derive(Debug, Default)]
pub struct RoomManager {
    /// Active rooms by ID
    rooms: HashMap<RoomId, Room>,
    /// Room each connection currently belongs to
    membership: HashMap<ConnectionId, RoomId>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair two participants.
    ///
    /// Both are removed from the pool (timers included) before the room is
    /// recorded, and both receive `matched` before this returns. `initiator`
    /// is the side that sends the WebRTC offer.
    pub fn create_room(
        &mut self,
        initiator: &Participant,
        responder: &Participant,
        pool: &mut WaitPool,
        outbound: &dyn ConnectionRegistry,
    ) -> Room {
        pool.remove(initiator.connection_id);
        pool.remove(responder.connection_id);

        let room = Room {
            id: generate_room_id(),
            participant_a: initiator.connection_id,
            participant_b: responder.connection_id,
            created_at: current_timestamp(),
        };

        self.membership
            .insert(room.participant_a, room.id.clone());
        self.membership
            .insert(room.participant_b, room.id.clone());
        self.rooms.insert(room.id.clone(), room.clone());

        outbound.send(
            initiator.connection_id,
            matched_notice(&room.id, true, initiator, responder),
        );
        outbound.send(
            responder.connection_id,
            matched_notice(&room.id, false, responder, initiator),
        );

        info!(
            "Room {} created: {} (initiator) <-> {}",
            room.id, room.participant_a, room.participant_b
        );
        room
    }

    /// Tear down the room `connection_id` belongs to and tell the peer.
    ///
    /// A no-op returning `None` when the connection is in no room.
    pub fn leave_room(
        &mut self,
        connection_id: ConnectionId,
        outbound: &dyn ConnectionRegistry,
    ) -> Option<Room> {
        let room_id = self.membership.remove(&connection_id)?;
        let room = self.rooms.remove(&room_id)?;

        if let Some(peer) = room.peer_of(connection_id) {
            self.membership.remove(&peer);
            if !outbound.send(peer, ServerMessage::PeerDisconnected) {
                debug!("Peer {} of room {} already gone", peer, room.id);
            }
        }

        info!("Room {} closed by {}", room.id, connection_id);
        Some(room)
    }

    /// The other member of `room_id`, only if `connection_id` is a member
    pub fn get_peer(&self, connection_id: ConnectionId, room_id: &RoomId) -> Option<ConnectionId> {
        self.rooms.get(room_id)?.peer_of(connection_id)
    }

    pub fn room_of(&self, connection_id: ConnectionId) -> Option<&Room> {
        self.membership
            .get(&connection_id)
            .and_then(|room_id| self.rooms.get(room_id))
    }

    pub fn is_in_room(&self, connection_id: ConnectionId) -> bool {
        self.membership.contains_key(&connection_id)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn clear(&mut self) {
        self.rooms.clear();
        self.membership.clear();
    }
}

fn matched_notice(
    room_id: &RoomId,
    initiator: bool,
    recipient: &Participant,
    peer: &Participant,
) -> ServerMessage {
    ServerMessage::Matched {
        room_id: room_id.clone(),
        initiator,
        peer_gender: peer.gender.disclosed(),
        peer_country: peer.resolved_country.clone(),
        common_interests: common_interests(&recipient.interests, &peer.interests),
    }
}
