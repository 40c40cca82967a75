//! Game events and the wire-format message exchanged with clients.

use pointer_common::id::{prefix, prefixed_ulid};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// The closed set of game events.
///
/// Pointer moves travel as `"M"`, the tag the browser client sends and
/// listens for; `"MOVE"` is accepted on input as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "HANDSHAKE")]
    Handshake,
    #[serde(rename = "PLAYER_JOINED")]
    PlayerJoined,
    #[serde(rename = "PLAYER_LEFT")]
    PlayerLeft,
    #[serde(rename = "M", alias = "MOVE")]
    Move,
}

impl EventKind {
    /// Events only the server may originate.
    pub fn is_lifecycle(self) -> bool {
        !matches!(self, EventKind::Move)
    }
}

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A single game event as relayed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveMessage {
    pub id: String,
    /// Set-once; see [`MoveMessage::claim_user_id`].
    #[serde(default)]
    user_id: String,
    pub event: EventKind,
    /// Client (or server, for lifecycle events) clock at send time, Unix ms.
    pub sent_at: i64,
    /// Server clock when a client-originated message arrived, Unix ms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_responded_at: Option<i64>,
    /// One-way client → server latency in ms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_ping: Option<i64>,
    #[serde(default)]
    pub coords: Vec<f32>,
    #[serde(default)]
    pub mouse_down: bool,
}

impl MoveMessage {
    /// A fresh server-originated message with a new ID, stamped now.
    pub fn new(event: EventKind) -> Self {
        Self {
            id: prefixed_ulid(prefix::MESSAGE),
            user_id: String::new(),
            event,
            sent_at: now_ms(),
            server_responded_at: None,
            up_ping: None,
            coords: Vec::new(),
            mouse_down: false,
        }
    }

    pub fn handshake(user_id: &str) -> Self {
        Self::new(EventKind::Handshake).with_user_id(user_id)
    }

    pub fn player_joined(user_id: &str) -> Self {
        Self::new(EventKind::PlayerJoined).with_user_id(user_id)
    }

    pub fn player_left(user_id: &str) -> Self {
        Self::new(EventKind::PlayerLeft).with_user_id(user_id)
    }

    /// Build the relayed form of a client move, received at `received_at` ms.
    ///
    /// The message gets its own server-side ID; the latency is derived from
    /// the client's `sentAt`, which must be close enough to `received_at`
    /// for the difference to fit in an `i64`.
    pub fn from_client(inbound: InboundMove, received_at: i64) -> Result<Self, DecodeError> {
        let up_ping = received_at
            .checked_sub(inbound.sent_at)
            .ok_or(DecodeError::SentAtOutOfRange(inbound.sent_at))?;
        Ok(Self {
            id: prefixed_ulid(prefix::MESSAGE),
            user_id: String::new(),
            event: inbound.event,
            sent_at: inbound.sent_at,
            server_responded_at: Some(received_at),
            up_ping: Some(up_ping),
            coords: inbound.coords,
            mouse_down: inbound.mouse_down,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Attribute the message to `id` unless it is already attributed.
    ///
    /// Returns `true` if this call set the value.
    pub fn claim_user_id(&mut self, id: &str) -> bool {
        if !self.user_id.is_empty() {
            return false;
        }
        self.user_id = id.to_string();
        true
    }

    pub fn with_user_id(mut self, id: &str) -> Self {
        self.claim_user_id(id);
        self
    }
}

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// A frame received from a client.
///
/// Client-supplied `id` and `userId` are ignored with any other unknown
/// field: the server assigns both.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMove {
    pub event: EventKind,
    #[serde(alias = "ts")]
    pub sent_at: i64,
    #[serde(default)]
    pub coords: Vec<f32>,
    #[serde(default)]
    pub mouse_down: bool,
}

/// Why an inbound text frame was discarded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("clients may not send {0:?} events")]
    ReservedEvent(EventKind),

    #[error("sentAt {0} is too far from server time")]
    SentAtOutOfRange(i64),
}

/// Decode a client text frame into the message to relay.
pub fn decode_inbound(text: &str, received_at: i64) -> Result<MoveMessage, DecodeError> {
    let inbound: InboundMove = serde_json::from_str(text)?;
    if inbound.event.is_lifecycle() {
        return Err(DecodeError::ReservedEvent(inbound.event));
    }
    MoveMessage::from_client(inbound, received_at)
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn claim_user_id_is_set_once() {
        let mut msg = MoveMessage::new(EventKind::Move);
        assert!(msg.claim_user_id("sub_a"));
        assert!(!msg.claim_user_id("sub_b"));
        assert_eq!(msg.user_id(), "sub_a");
    }

    #[test]
    fn message_ids_are_unique() {
        let a = MoveMessage::handshake("sub_a");
        let b = MoveMessage::handshake("sub_a");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("msg_"));
    }

    #[test]
    fn lifecycle_messages_carry_user_and_no_coords() {
        let msg = MoveMessage::player_left("sub_x");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], "PLAYER_LEFT");
        assert_eq!(value["userId"], "sub_x");
        assert_eq!(value["coords"], json!([]));
        assert!(value.get("serverRespondedAt").is_none());
    }

    #[test]
    fn move_serializes_with_client_tag() {
        let inbound: InboundMove = serde_json::from_value(json!({
            "event": "M", "sentAt": 100, "coords": [1.0, 2.0], "mouseDown": true
        }))
        .unwrap();
        let msg = MoveMessage::from_client(inbound, 130)
            .unwrap()
            .with_user_id("sub_a");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], "M");
        assert_eq!(value["userId"], "sub_a");
        assert_eq!(value["coords"], json!([1.0, 2.0]));
        assert_eq!(value["mouseDown"], true);
        assert_eq!(value["serverRespondedAt"], 130);
        assert_eq!(value["upPing"], 30);
    }

    #[test]
    fn decode_stamps_latency() {
        let sent_at = now_ms() - 25;
        let text = json!({ "event": "MOVE", "sentAt": sent_at, "coords": [3.5, 4.0] }).to_string();
        let received_at = now_ms();

        let msg = decode_inbound(&text, received_at).unwrap();
        let responded = msg.server_responded_at.unwrap();
        assert!(responded >= sent_at);
        assert_eq!(msg.up_ping, Some(responded - sent_at));
        assert!(msg.up_ping.unwrap() >= 0);
        assert!(!msg.mouse_down);
    }

    #[test]
    fn decode_accepts_legacy_ts_and_ignores_unknown_fields() {
        let text = r#"{"id":"client-id","userId":"spoofed","event":"M","ts":5,"coords":[0,0],"source":"C"}"#;
        let msg = decode_inbound(text, 10).unwrap();
        assert_eq!(msg.sent_at, 5);
        assert_ne!(msg.id, "client-id");
        assert_eq!(msg.user_id(), "");
    }

    #[test]
    fn decode_rejects_malformed_and_reserved_events() {
        assert!(matches!(decode_inbound("{not json", 0), Err(DecodeError::Json(_))));
        assert!(matches!(
            decode_inbound(r#"{"event":"M"}"#, 0),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode_inbound(r#"{"event":"BOGUS","sentAt":1}"#, 0),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode_inbound(r#"{"event":"PLAYER_LEFT","sentAt":1}"#, 0),
            Err(DecodeError::ReservedEvent(EventKind::PlayerLeft))
        ));
    }

    #[test]
    fn rejects_sent_at_that_overflows_latency() {
        let now = now_ms();
        let text = format!(r#"{{"event":"M","sentAt":{},"coords":[1,2]}}"#, i64::MIN);
        assert!(matches!(
            decode_inbound(&text, now),
            Err(DecodeError::SentAtOutOfRange(i64::MIN))
        ));

        let text = format!(r#"{{"event":"M","sentAt":{},"coords":[1,2]}}"#, i64::MAX);
        assert!(matches!(
            decode_inbound(&text, -2),
            Err(DecodeError::SentAtOutOfRange(i64::MAX))
        ));

        // Representable, so the latency relation still holds exactly.
        let msg = decode_inbound(&text, now).unwrap();
        assert_eq!(msg.up_ping, Some(now - i64::MAX));
        assert_eq!(msg.server_responded_at, Some(now));
    }

    #[test]
    fn far_future_sent_at_gives_negative_latency() {
        let msg = decode_inbound(r#"{"event":"M","sentAt":1000,"coords":[]}"#, 400).unwrap();
        assert_eq!(msg.up_ping, Some(-600));
    }

    #[test]
    fn round_trips_through_json() {
        let msg = MoveMessage::player_joined("sub_b");
        let text = serde_json::to_string(&msg).unwrap();
        let parsed: MoveMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, msg);
    }
}
