//! Wait queue, escalation timers and partner selection
//!
//! Participants that cannot be paired on arrival wait in the queue. Each one
//! carries a timer that, once elapsed, retries the search with the country
//! filters relaxed.

pub mod escalation;
pub mod matching;
pub mod pool;
pub mod queue;

pub use escalation::{EscalationDue, EscalationScheduler};
pub use matching::{CompatibilityMatcher, MatchOutcome, PartnerMatcher};
pub use pool::WaitPool;
pub use queue::WaitQueue;
