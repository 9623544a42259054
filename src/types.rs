//! Common types used throughout the pairing service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use uuid::Uuid;

/// Opaque handle to a transport-level connection
pub type ConnectionId = Uuid;

/// Client-supplied identifier, unique per browser tab / page load
pub type SessionId = String;

/// Unique identifier for rooms
pub type RoomId = String;

/// Self-declared gender of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "O")]
    Other,
    #[serde(rename = "U")]
    #[default]
    Unknown,
}

impl Gender {
    /// Parse a wire value. Only the three declared genders are accepted;
    /// `Unknown` is never produced here so callers decide the fallback.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Some(Gender::Male),
            "f" | "female" => Some(Gender::Female),
            "o" | "other" => Some(Gender::Other),
            _ => None,
        }
    }

    /// Gender to disclose to a peer, `None` when undeclared
    pub fn disclosed(self) -> Option<Self> {
        match self {
            Gender::Unknown => None,
            known => Some(known),
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "M"),
            Gender::Female => write!(f, "F"),
            Gender::Other => write!(f, "O"),
            Gender::Unknown => write!(f, "?"),
        }
    }
}

/// ISO 3166-1 alpha-2 country code, always upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryCode(String);

impl CountryCode {
    /// Parse a two-letter code, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(Self(value.to_ascii_uppercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CountryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Set of acceptable partner countries; empty means "no preference"
pub type CountryFilter = BTreeSet<CountryCode>;

/// A participant waiting for, or entering, a pairing
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub session_id: SessionId,
    pub gender: Gender,
    pub want_gender: Option<Gender>,
    /// True only when a boost token was verified for this join
    pub boost_active: bool,
    pub country_filter: CountryFilter,
    pub resolved_country: Option<CountryCode>,
    pub interests: Vec<String>,
    pub max_wait_seconds: u64,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Delay before the country filter of this participant is relaxed
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds.max(1))
    }
}

/// Pairing of exactly two connections for the duration of one session
#[derive(Debug, Clone, Serialize)]
pub struct Room {
    pub id: RoomId,
    /// Member that sends the WebRTC offer
    pub participant_a: ConnectionId,
    pub participant_b: ConnectionId,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.participant_a == connection_id || self.participant_b == connection_id
    }

    /// The other member, if `connection_id` belongs to this room
    pub fn peer_of(&self, connection_id: ConnectionId) -> Option<ConnectionId> {
        if self.participant_a == connection_id {
            Some(self.participant_b)
        } else if self.participant_b == connection_id {
            Some(self.participant_a)
        } else {
            None
        }
    }
}

/// Why a room was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseReason {
    Next,
    Disconnect,
    Rejoin,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::Next => "next",
            CloseReason::Disconnect => "disconnect",
            CloseReason::Rejoin => "rejoin",
        }
    }
}

/// What produced a pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTrigger {
    Join,
    Escalation,
}

impl MatchTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchTrigger::Join => "join",
            MatchTrigger::Escalation => "escalation",
        }
    }
}
