//! The engine task
//!
//! `PairingService` owns every piece of mutable pairing state. Its run loop
//! selects over three inputs (handle commands, escalation firings and settled
//! boost checks) and applies each one to completion before taking the next,
//! so no input ever observes another one half-applied.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::boost::{BoostDecision, BoostVerifier};
use crate::config::AppConfig;
use crate::connection::{ConnectionRegistry, LiveConnections, Outbound};
use crate::engine::command::{BoostOutcome, BoostSettled, PairingCommand, PairingStats};
use crate::engine::handle::PairingHandle;
use crate::matchmaking::{
    CompatibilityMatcher, EscalationDue, MatchOutcome, PartnerMatcher, WaitPool,
};
use crate::metrics::MetricsCollector;
use crate::room::RoomManager;
use crate::signal::{RelayOutcome, SignalMessage, SignalRelay};
use crate::transport::protocol::{JoinRequest, ServerMessage};
use crate::types::{
    CloseReason, ConnectionId, CountryCode, Gender, MatchTrigger, Participant, Room, RoomId,
};
use crate::utils::current_timestamp;

/// Owner of all pairing state
pub struct PairingService {
    connections: LiveConnections,
    pool: WaitPool,
    rooms: RoomManager,
    relay: SignalRelay,
    matcher: Arc<dyn PartnerMatcher>,
    boost_verifier: Arc<dyn BoostVerifier>,
    boost_timeout: Duration,
    /// Latest join generation per connection; a settled boost check for an
    /// older generation is discarded
    join_generations: HashMap<ConnectionId, u64>,
    next_generation: u64,
    metrics: Option<Arc<MetricsCollector>>,
    rooms_created: u64,
    escalations_fired: u64,
    commands: mpsc::UnboundedReceiver<PairingCommand>,
    escalations: mpsc::UnboundedReceiver<EscalationDue>,
    boost_tx: mpsc::UnboundedSender<BoostSettled>,
    boost_rx: mpsc::UnboundedReceiver<BoostSettled>,
}

impl PairingService {
    /// Create the engine and the handle that drives it
    pub fn new(
        config: &AppConfig,
        boost_verifier: Arc<dyn BoostVerifier>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> (Self, PairingHandle) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (escalation_tx, escalations) = mpsc::unbounded_channel();
        let (boost_tx, boost_rx) = mpsc::unbounded_channel();

        let service = Self {
            connections: LiveConnections::new(),
            pool: WaitPool::new(escalation_tx),
            rooms: RoomManager::new(),
            relay: SignalRelay::new(),
            matcher: Arc::new(CompatibilityMatcher::new()),
            boost_verifier,
            boost_timeout: config.boost_timeout(),
            join_generations: HashMap::new(),
            next_generation: 0,
            metrics,
            rooms_created: 0,
            escalations_fired: 0,
            commands,
            escalations,
            boost_tx,
            boost_rx,
        };

        (service, PairingHandle::new(command_tx))
    }

    /// Create the engine and run it on a new task
    pub fn spawn(
        config: &AppConfig,
        boost_verifier: Arc<dyn BoostVerifier>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> (PairingHandle, JoinHandle<()>) {
        let (service, handle) = Self::new(config, boost_verifier, metrics);
        let task = tokio::spawn(service.run());
        (handle, task)
    }

    /// Process inputs until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!("Pairing engine started");

        loop {
            let started = Instant::now();
            let input = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(PairingCommand::Shutdown { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => {
                        let name = command.name();
                        self.handle_command(command);
                        name
                    }
                    None => {
                        info!("All pairing handles dropped");
                        self.shutdown();
                        break;
                    }
                },
                Some(due) = self.escalations.recv() => {
                    self.handle_escalation(due);
                    "escalation"
                }
                Some(settled) = self.boost_rx.recv() => {
                    self.handle_boost_settled(settled);
                    "boost_settled"
                }
            };

            self.refresh_gauges();
            if let Some(metrics) = &self.metrics {
                metrics.record_event_processing(input, started.elapsed());
            }
        }

        info!("Pairing engine stopped");
    }

    fn handle_command(&mut self, command: PairingCommand) {
        match command {
            PairingCommand::Connect {
                connection_id,
                outbound,
                resolved_country,
            } => self.handle_connect(connection_id, outbound, resolved_country),
            PairingCommand::Join {
                connection_id,
                request,
            } => self.handle_join(connection_id, request),
            PairingCommand::Next {
                connection_id,
                room_id,
            } => self.handle_next(connection_id, room_id),
            PairingCommand::Disconnect { connection_id } => self.handle_disconnect(connection_id),
            PairingCommand::Signal {
                connection_id,
                message,
            } => self.handle_signal(connection_id, message),
            PairingCommand::BroadcastOnlineCount => self.broadcast_online_count(),
            PairingCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            // Handled by the run loop
            PairingCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn handle_connect(
        &mut self,
        connection_id: ConnectionId,
        outbound: Outbound,
        resolved_country: Option<CountryCode>,
    ) {
        info!(
            "Connection {} opened (country: {})",
            connection_id,
            resolved_country
                .as_ref()
                .map(CountryCode::as_str)
                .unwrap_or("unresolved")
        );
        self.connections
            .register(connection_id, outbound, resolved_country);

        let n = self.connections.live_count();
        self.connections
            .send(connection_id, ServerMessage::OnlineCount { n });

        if let Some(metrics) = &self.metrics {
            metrics.record_connection_opened();
        }
    }

    fn handle_join(&mut self, connection_id: ConnectionId, request: JoinRequest) {
        if self.connections.get(connection_id).is_none() {
            warn!("Join from unknown connection {}, ignoring", connection_id);
            return;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_join();
        }

        // A re-join replaces whatever the connection was doing before
        self.pool.remove(connection_id);
        self.close_room(connection_id, CloseReason::Rejoin);

        let generation = self.bump_generation(connection_id);

        match request.boost_token.clone() {
            Some(token) => self.start_boost_check(connection_id, generation, token, request),
            None => self.complete_join(connection_id, request, None),
        }
    }

    fn bump_generation(&mut self, connection_id: ConnectionId) -> u64 {
        self.next_generation += 1;
        self.join_generations
            .insert(connection_id, self.next_generation);
        self.next_generation
    }

    /// Verify a boost token off the engine task. The join resumes when the
    /// result comes back as a [`BoostSettled`] input.
    fn start_boost_check(
        &self,
        connection_id: ConnectionId,
        generation: u64,
        token: String,
        request: JoinRequest,
    ) {
        debug!("Verifying boost token for {}", connection_id);

        let verifier = self.boost_verifier.clone();
        let timeout = self.boost_timeout;
        let settled_tx = self.boost_tx.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = match tokio::time::timeout(timeout, verifier.verify(&token)).await {
                Ok(Ok(BoostDecision::Granted { want_gender, .. })) => {
                    BoostOutcome::Granted(want_gender)
                }
                Ok(Ok(BoostDecision::Rejected { reason })) => BoostOutcome::Rejected(reason),
                Ok(Err(e)) => BoostOutcome::Failed(e.to_string()),
                Err(_) => BoostOutcome::TimedOut,
            };

            let _ = settled_tx.send(BoostSettled {
                connection_id,
                generation,
                request,
                outcome,
                elapsed: started.elapsed(),
            });
        });
    }

    fn handle_boost_settled(&mut self, settled: BoostSettled) {
        let BoostSettled {
            connection_id,
            generation,
            request,
            outcome,
            elapsed,
        } = settled;

        if let Some(metrics) = &self.metrics {
            metrics.record_boost_verification(outcome.as_str(), elapsed);
        }

        if self.join_generations.get(&connection_id) != Some(&generation) {
            debug!(
                "Discarding boost result for {} - join superseded",
                connection_id
            );
            return;
        }

        match &outcome {
            BoostOutcome::Granted(gender) => {
                info!("Boost granted for {} (wants {})", connection_id, gender)
            }
            BoostOutcome::Rejected(reason) => {
                warn!("Boost rejected for {}: {}", connection_id, reason)
            }
            BoostOutcome::Failed(reason) => {
                warn!("Boost check failed for {}: {}", connection_id, reason)
            }
            BoostOutcome::TimedOut => warn!("Boost check timed out for {}", connection_id),
        }

        self.complete_join(connection_id, request, outcome.granted_gender());
    }

    /// Match the participant now or queue it
    fn complete_join(
        &mut self,
        connection_id: ConnectionId,
        request: JoinRequest,
        boosted_gender: Option<Gender>,
    ) {
        if !self.connections.is_live(connection_id) {
            debug!("Connection {} gone before its join completed", connection_id);
            return;
        }

        let resolved_country = if request.privacy_mode {
            None
        } else {
            self.connections.resolved_country(connection_id)
        };

        let participant = Participant {
            connection_id,
            session_id: request.session_id,
            gender: request.gender,
            want_gender: boosted_gender.or(request.want_gender),
            boost_active: boosted_gender.is_some(),
            country_filter: request.countries,
            resolved_country,
            interests: request.interests,
            max_wait_seconds: request.max_wait_seconds,
            joined_at: current_timestamp(),
        };

        let outcome = self
            .matcher
            .find_candidate(&participant, self.pool.queue(), &self.connections, false);
        let candidate = self.take_candidate(outcome);

        match candidate {
            Some(candidate) => {
                self.open_room(&participant, &candidate, MatchTrigger::Join);
            }
            None => {
                info!(
                    "Queued {} (wait {}s, {} ahead)",
                    connection_id,
                    participant.max_wait_seconds,
                    self.pool.len()
                );
                self.pool.enqueue(participant);
                self.connections.send(connection_id, ServerMessage::Waiting);
            }
        }
    }

    /// Purge stale entries a scan reported and return its candidate
    fn take_candidate(&mut self, outcome: MatchOutcome) -> Option<Participant> {
        if !outcome.stale.is_empty() {
            debug!("Purging {} stale queue entries", outcome.stale.len());
            for stale in &outcome.stale {
                self.pool.remove(*stale);
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_stale_purged(outcome.stale.len());
            }
        }
        outcome.candidate
    }

    fn handle_escalation(&mut self, due: EscalationDue) {
        let Some(participant) = self.pool.accept_escalation(due) else {
            debug!(
                "Ignoring escalation for {} - no longer waiting",
                due.connection_id
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_escalation("stale");
            }
            return;
        };

        if !self.connections.is_live(participant.connection_id) {
            self.pool.remove(participant.connection_id);
            if let Some(metrics) = &self.metrics {
                metrics.record_escalation("stale");
                metrics.record_stale_purged(1);
            }
            return;
        }

        self.escalations_fired += 1;
        debug!(
            "Escalating {} after {}s, country filter relaxed",
            participant.connection_id, participant.max_wait_seconds
        );

        let outcome =
            self.matcher
                .find_candidate(&participant, self.pool.queue(), &self.connections, true);

        match self.take_candidate(outcome) {
            Some(candidate) => {
                self.open_room(&participant, &candidate, MatchTrigger::Escalation);
                if let Some(metrics) = &self.metrics {
                    metrics.record_escalation("matched");
                }
            }
            None => {
                info!(
                    "No fallback partner for {}, staying queued",
                    participant.connection_id
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_escalation("unmatched");
                }
            }
        }
    }

    fn open_room(&mut self, initiator: &Participant, responder: &Participant, trigger: MatchTrigger) {
        let room = self
            .rooms
            .create_room(initiator, responder, &mut self.pool, &self.connections);
        self.rooms_created += 1;

        if let Some(metrics) = &self.metrics {
            let waits = [
                elapsed_since(initiator.joined_at),
                elapsed_since(responder.joined_at),
            ];
            metrics.record_room_created(trigger, &waits);
        }

        debug!("Room {} opened on {}", room.id, trigger.as_str());
    }

    fn handle_next(&mut self, connection_id: ConnectionId, room_id: Option<RoomId>) {
        // Supersedes a join still waiting on its boost check
        self.join_generations.remove(&connection_id);
        self.pool.remove(connection_id);

        match (self.close_room(connection_id, CloseReason::Next), room_id) {
            (Some(room), Some(requested)) if room.id != requested => debug!(
                "Next from {} named room {} but left {}",
                connection_id, requested, room.id
            ),
            (None, _) => debug!("Next from {} outside any room", connection_id),
            _ => {}
        }
    }

    fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        self.join_generations.remove(&connection_id);
        self.pool.remove(connection_id);
        self.close_room(connection_id, CloseReason::Disconnect);

        if self.connections.unregister(connection_id).is_some() {
            info!("Connection {} closed", connection_id);
        }
    }

    fn close_room(&mut self, connection_id: ConnectionId, reason: CloseReason) -> Option<Room> {
        let room = self.rooms.leave_room(connection_id, &self.connections)?;
        info!("Room {} closed ({})", room.id, reason.as_str());
        if let Some(metrics) = &self.metrics {
            metrics.record_room_closed(reason, elapsed_since(room.created_at));
        }
        Some(room)
    }

    fn handle_signal(&mut self, connection_id: ConnectionId, message: SignalMessage) {
        let kind = message.kind.as_str();
        let outcome = self
            .relay
            .relay(connection_id, message, &self.rooms, &self.connections);

        if let Some(metrics) = &self.metrics {
            metrics.record_signal(kind, matches!(outcome, RelayOutcome::Forwarded(_)));
        }
    }

    fn broadcast_online_count(&mut self) {
        let n = self.connections.live_count();
        let delivered = self.connections.broadcast(&ServerMessage::OnlineCount { n });
        debug!("Online count {} sent to {} connections", n, delivered);
    }

    pub fn stats(&self) -> PairingStats {
        PairingStats {
            queue_length: self.pool.len(),
            active_rooms: self.rooms.active_rooms(),
            live_connections: self.connections.live_count(),
            pending_escalations: self.pool.pending_escalations(),
            rooms_created: self.rooms_created,
            escalations_fired: self.escalations_fired,
        }
    }

    fn refresh_gauges(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.update_from_stats(&self.stats());
        }
    }

    fn shutdown(&mut self) {
        info!(
            "Shutting down pairing engine ({} queued, {} rooms)",
            self.pool.len(),
            self.rooms.active_rooms()
        );
        self.pool.clear();
        self.rooms.clear();
        self.connections.clear();
        self.join_generations.clear();
        self.refresh_gauges();
    }
}

fn elapsed_since(at: chrono::DateTime<chrono::Utc>) -> Duration {
    (current_timestamp() - at).to_std().unwrap_or_default()
}
