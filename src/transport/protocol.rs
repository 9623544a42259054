//! Wire protocol for the WebSocket transport
//!
//! Every frame is a JSON object with a kebab-case `type` discriminator and
//! camelCase fields. Join payloads are validated and defaulted exactly once,
//! here, so nothing deeper in the service ever sees a partially-typed request.

use serde::Serialize;
use serde_json::Value;

use crate::config::MatchmakingSettings;
use crate::error::PairingError;
use crate::signal::{SignalKind, SignalMessage};
use crate::types::{ConnectionId, CountryCode, CountryFilter, Gender, RoomId, SessionId};

/// Limits applied while defaulting a join payload
#[derive(Debug, Clone)]
pub struct JoinLimits {
    pub default_max_wait_seconds: u64,
    pub max_interests: usize,
}

impl Default for JoinLimits {
    fn default() -> Self {
        Self {
            default_max_wait_seconds: 5,
            max_interests: 5,
        }
    }
}

impl From<&MatchmakingSettings> for JoinLimits {
    fn from(settings: &MatchmakingSettings) -> Self {
        Self {
            default_max_wait_seconds: settings.default_max_wait_seconds,
            max_interests: settings.max_interests,
        }
    }
}

/// A validated join request
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    pub session_id: SessionId,
    pub gender: Gender,
    /// Client-declared preference; a verified boost overrides it
    pub want_gender: Option<Gender>,
    pub boost_token: Option<String>,
    pub countries: CountryFilter,
    pub interests: Vec<String>,
    pub max_wait_seconds: u64,
    pub privacy_mode: bool,
}

impl JoinRequest {
    /// Build a request from an arbitrary JSON value.
    ///
    /// Never fails: every missing or wrong-typed field takes its default.
    pub fn from_value(value: &Value, connection_id: ConnectionId, limits: &JoinLimits) -> Self {
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| connection_id.to_string());

        let gender = value
            .get("gender")
            .and_then(Value::as_str)
            .and_then(Gender::parse)
            .unwrap_or(Gender::Unknown);

        let want_gender = value
            .get("wantGender")
            .and_then(Value::as_str)
            .and_then(Gender::parse);

        let boost_token = value
            .get("boostToken")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let countries = value
            .get("countries")
            .and_then(Value::as_array)
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(CountryCode::parse)
                    .collect()
            })
            .unwrap_or_default();

        let interests = value
            .get("interests")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .take(limits.max_interests)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let max_wait_seconds = value
            .get("maxWait")
            .and_then(Value::as_f64)
            .map(|secs| secs.max(1.0) as u64)
            .unwrap_or(limits.default_max_wait_seconds)
            .max(1);

        let privacy_mode = value
            .get("privacyMode")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Self {
            session_id,
            gender,
            want_gender,
            boost_token,
            countries,
            interests,
            max_wait_seconds,
            privacy_mode,
        }
    }
}

/// Messages a client may send
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join(JoinRequest),
    Signal(SignalMessage),
    Next { room_id: Option<RoomId> },
}

impl ClientMessage {
    /// Parse a text frame
    pub fn parse(
        text: &str,
        connection_id: ConnectionId,
        limits: &JoinLimits,
    ) -> Result<Self, PairingError> {
        let value: Value = serde_json::from_str(text).map_err(|e| PairingError::InvalidMessage {
            reason: format!("not JSON: {}", e),
        })?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| PairingError::InvalidMessage {
                reason: "missing type".to_string(),
            })?;

        match kind {
            "join" => Ok(ClientMessage::Join(JoinRequest::from_value(
                &value,
                connection_id,
                limits,
            ))),
            "next" => Ok(ClientMessage::Next {
                room_id: room_id_of(&value),
            }),
            other => {
                let signal_kind =
                    SignalKind::from_wire(other).ok_or_else(|| PairingError::InvalidMessage {
                        reason: format!("unknown type '{}'", other),
                    })?;
                let room_id = room_id_of(&value).ok_or_else(|| PairingError::InvalidMessage {
                    reason: format!("{} without roomId", other),
                })?;
                let payload = value
                    .get(signal_kind.payload_field())
                    .cloned()
                    .unwrap_or(Value::Null);

                Ok(ClientMessage::Signal(SignalMessage {
                    kind: signal_kind,
                    room_id,
                    payload,
                }))
            }
        }
    }
}

fn room_id_of(value: &Value) -> Option<RoomId> {
    value
        .get("roomId")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Messages the server sends to a client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Waiting,
    Matched {
        room_id: RoomId,
        initiator: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        peer_gender: Option<Gender>,
        #[serde(skip_serializing_if = "Option::is_none")]
        peer_country: Option<CountryCode>,
        common_interests: Vec<String>,
    },
    Offer {
        room_id: RoomId,
        offer: Value,
    },
    Answer {
        room_id: RoomId,
        answer: Value,
    },
    IceCandidate {
        room_id: RoomId,
        candidate: Value,
    },
    PeerDisconnected,
    OnlineCount {
        n: usize,
    },
}

impl ServerMessage {
    /// Forwarded handshake message, payload untouched
    pub fn signal(kind: SignalKind, room_id: RoomId, payload: Value) -> Self {
        match kind {
            SignalKind::Offer => ServerMessage::Offer {
                room_id,
                offer: payload,
            },
            SignalKind::Answer => ServerMessage::Answer {
                room_id,
                answer: payload,
            },
            SignalKind::IceCandidate => ServerMessage::IceCandidate {
                room_id,
                candidate: payload,
            },
        }
    }

    /// Short name used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Waiting => "waiting",
            ServerMessage::Matched { .. } => "matched",
            ServerMessage::Offer { .. } => "offer",
            ServerMessage::Answer { .. } => "answer",
            ServerMessage::IceCandidate { .. } => "ice-candidate",
            ServerMessage::PeerDisconnected => "peer-disconnected",
            ServerMessage::OnlineCount { .. } => "online-count",
        }
    }
}
