//! Utility functions for the pairing service

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::types::{ConnectionId, RoomId};

/// Generate a new unique connection ID
pub fn generate_connection_id() -> ConnectionId {
    Uuid::new_v4()
}

/// Generate a new unique room ID
pub fn generate_room_id() -> RoomId {
    format!("r_{}", Uuid::new_v4().simple())
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Interests shared by both lists, compared case-insensitively.
///
/// The result is lower-cased, deduplicated, and ordered as in `ours`.
pub fn common_interests(ours: &[String], theirs: &[String]) -> Vec<String> {
    if ours.is_empty() || theirs.is_empty() {
        return Vec::new();
    }

    let theirs: HashSet<String> = theirs.iter().map(|i| i.to_lowercase()).collect();
    let mut seen = HashSet::new();

    ours.iter()
        .map(|i| i.to_lowercase())
        .filter(|i| theirs.contains(i) && seen.insert(i.clone()))
        .collect()
}

/// Number of interests shared by both lists
pub fn interest_score(ours: &[String], theirs: &[String]) -> usize {
    common_interests(ours, theirs).len()
}
