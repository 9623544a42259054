//! One-shot escalation timers for queued participants
//!
//! Each timer runs as a sleeping task. When it fires it does not touch any
//! state: it posts an [`EscalationDue`] back to the owner, which decides on
//! its own timeline whether the firing is still relevant.

use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Duration;
use tracing::debug;

use crate::types::ConnectionId;

/// A timer that has elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationDue {
    pub connection_id: ConnectionId,
    /// Identifies the arming this firing belongs to
    pub token: u64,
}

#[derive(Debug)]
struct PendingEscalation {
    token: u64,
    handle: AbortHandle,
}

/// At most one pending timer per connection
#[derive(Debug)]
pub struct EscalationScheduler {
    pending: HashMap<ConnectionId, PendingEscalation>,
    next_token: u64,
    due_tx: mpsc::UnboundedSender<EscalationDue>,
}

impl EscalationScheduler {
    pub fn new(due_tx: mpsc::UnboundedSender<EscalationDue>) -> Self {
        Self {
            pending: HashMap::new(),
            next_token: 0,
            due_tx,
        }
    }

    /// Arm a timer, replacing any pending one for the same connection.
    ///
    /// Delays past the end of the clock never fire. Must be called from
    /// within a tokio runtime.
    pub fn schedule(&mut self, connection_id: ConnectionId, delay: Duration) -> u64 {
        self.cancel(connection_id);

        self.next_token += 1;
        let token = self.next_token;
        let due_tx = self.due_tx.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = due_tx.send(EscalationDue {
                connection_id,
                token,
            });
        });

        self.pending.insert(
            connection_id,
            PendingEscalation {
                token,
                handle: task.abort_handle(),
            },
        );

        debug!(
            "Escalation armed for {} in {:.1}s (token {})",
            connection_id,
            delay.as_secs_f64(),
            token
        );
        token
    }

    /// Cancel the pending timer; a no-op when none is armed
    pub fn cancel(&mut self, connection_id: ConnectionId) -> bool {
        match self.pending.remove(&connection_id) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Consume a firing if it belongs to the currently armed timer.
    ///
    /// A firing whose timer was cancelled or re-armed after it was posted is
    /// rejected.
    pub fn take_if_current(&mut self, due: EscalationDue) -> bool {
        match self.pending.get(&due.connection_id) {
            Some(pending) if pending.token == due.token => {
                self.pending.remove(&due.connection_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self, connection_id: ConnectionId) -> bool {
        self.pending.contains_key(&connection_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.handle.abort();
        }
    }
}

impl Drop for EscalationScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
