//! Wait queue and escalation timers kept in lockstep
//!
//! Every way into or out of the queue also arms or cancels the matching
//! timer, so a timer never outlives its queue entry.

use tokio::sync::mpsc;

use crate::matchmaking::escalation::{EscalationDue, EscalationScheduler};
use crate::matchmaking::queue::WaitQueue;
use crate::types::{ConnectionId, Participant};

#[derive(Debug)]
pub struct WaitPool {
    queue: WaitQueue,
    escalation: EscalationScheduler,
}

impl WaitPool {
    pub fn new(due_tx: mpsc::UnboundedSender<EscalationDue>) -> Self {
        Self {
            queue: WaitQueue::new(),
            escalation: EscalationScheduler::new(due_tx),
        }
    }

    /// Queue a participant and arm its escalation timer for `max_wait`
    pub fn enqueue(&mut self, participant: Participant) -> u64 {
        let connection_id = participant.connection_id;
        let delay = participant.max_wait();
        self.queue.enqueue(participant);
        self.escalation.schedule(connection_id, delay)
    }

    /// Dequeue a participant and cancel its timer. Idempotent.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<Participant> {
        self.escalation.cancel(connection_id);
        self.queue.remove(connection_id)
    }

    /// Accept a timer firing.
    ///
    /// Returns the participant to escalate only if the firing belongs to the
    /// current timer and the participant is still queued.
    pub fn accept_escalation(&mut self, due: EscalationDue) -> Option<Participant> {
        if !self.escalation.take_if_current(due) {
            return None;
        }
        self.queue.get(due.connection_id).cloned()
    }

    pub fn queue(&self) -> &WaitQueue {
        &self.queue
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.queue.contains(connection_id)
    }

    pub fn has_pending_escalation(&self, connection_id: ConnectionId) -> bool {
        self.escalation.is_pending(connection_id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending_escalations(&self) -> usize {
        self.escalation.pending_count()
    }

    pub fn clear(&mut self) {
        self.escalation.cancel_all();
        self.queue.clear();
    }
}
