//! Partner selection for a joining or escalating participant
//!
//! Candidates are scanned in queue order. Hard constraints (identity, gender,
//! country) decide eligibility; shared interests rank the eligible ones.

use crate::connection::ConnectionRegistry;
use crate::matchmaking::queue::WaitQueue;
use crate::types::{ConnectionId, CountryCode, CountryFilter, Gender, Participant};
use crate::utils::interest_score;

/// Result of one candidate scan
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Selected partner, if any candidate passed every constraint
    pub candidate: Option<Participant>,
    /// Number of interests shared with the selected partner
    pub score: usize,
    /// Queued connections found to be no longer live
    pub stale: Vec<ConnectionId>,
}

/// Trait for partner selection algorithms
pub trait PartnerMatcher: Send + Sync {
    /// Pick the best queued partner for `user`.
    ///
    /// The queue is not modified; stale entries are reported in the outcome
    /// for the caller to purge.
    fn find_candidate(
        &self,
        user: &Participant,
        queue: &WaitQueue,
        registry: &dyn ConnectionRegistry,
        ignore_country: bool,
    ) -> MatchOutcome;

    /// Check whether two participants may be paired at all
    fn is_compatible(&self, user: &Participant, candidate: &Participant, ignore_country: bool)
        -> bool;
}

/// Matcher enforcing mutual gender and country preferences, ranked by
/// common interests
#[derive(Debug, Default, Clone, Copy)]
pub struct CompatibilityMatcher;

impl CompatibilityMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl PartnerMatcher for CompatibilityMatcher {
    fn find_candidate(
        &self,
        user: &Participant,
        queue: &WaitQueue,
        registry: &dyn ConnectionRegistry,
        ignore_country: bool,
    ) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        let mut best: Option<(&Participant, usize)> = None;

        for candidate in queue.iter() {
            if candidate.connection_id == user.connection_id {
                continue;
            }

            if !registry.is_live(candidate.connection_id) {
                outcome.stale.push(candidate.connection_id);
                continue;
            }

            if !self.is_compatible(user, candidate, ignore_country) {
                continue;
            }

            let score = interest_score(&user.interests, &candidate.interests);
            // Strictly greater keeps the earliest candidate on ties
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }

        if let Some((candidate, score)) = best {
            outcome.candidate = Some(candidate.clone());
            outcome.score = score;
        }
        outcome
    }

    fn is_compatible(
        &self,
        user: &Participant,
        candidate: &Participant,
        ignore_country: bool,
    ) -> bool {
        if candidate.session_id == user.session_id {
            return false;
        }

        if !gender_compatible(user, candidate) {
            return false;
        }

        ignore_country || countries_compatible(user, candidate)
    }
}

/// Both sides' gender wishes are satisfied by the other
pub fn gender_compatible(a: &Participant, b: &Participant) -> bool {
    wants(a.want_gender, b.gender) && wants(b.want_gender, a.gender)
}

fn wants(want: Option<Gender>, gender: Gender) -> bool {
    want.map_or(true, |wanted| wanted == gender)
}

/// Whether a filter lets a partner from `country` through.
///
/// An unresolved country always passes: the filter only rejects partners
/// known to be elsewhere.
pub fn country_filter_accepts(filter: &CountryFilter, country: Option<&CountryCode>) -> bool {
    match country {
        _ if filter.is_empty() => true,
        None => true,
        Some(code) => filter.contains(code),
    }
}

/// Both sides' country filters accept the other
pub fn countries_compatible(a: &Participant, b: &Participant) -> bool {
    country_filter_accepts(&a.country_filter, b.resolved_country.as_ref())
        && country_filter_accepts(&b.country_filter, a.resolved_country.as_ref())
}
