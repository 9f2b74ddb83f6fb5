//! Message model and user identities

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Marker the message store uses for messages written by the local user.
///
/// The store puts it in the same field as real user ids, so a partner whose
/// id is literally `me` could not be told apart from the local user. Such
/// partners are refused when a conversation is created (see
/// [`UserId::is_outgoing_marker`]).
pub const OUTGOING_SENDER_MARKER: &str = "me";

/// Identity of a user (the local user or a conversation partner).
///
/// Comparison is exact string equality; no case folding or trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this id collides with [`OUTGOING_SENDER_MARKER`]
    pub fn is_outgoing_marker(&self) -> bool {
        self.0 == OUTGOING_SENDER_MARKER
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which side of the conversation wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
}

/// A single chat message as delivered by the message store.
///
/// Immutable once received; batches are ordered by `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author identity, or [`OUTGOING_SENDER_MARKER`] for our own messages
    pub sender: String,
    pub text: String,
    #[serde(with = "wire_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Server-side row id, when the store provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Message {
    pub fn new(sender: impl Into<String>, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            timestamp,
            id: None,
        }
    }

    /// Classify the message relative to the local user
    pub fn direction(&self, local_user: &UserId) -> Direction {
        if self.sender == local_user.as_str() || self.sender == OUTGOING_SENDER_MARKER {
            Direction::Sent
        } else {
            Direction::Received
        }
    }
}

/// Format a timestamp the way the client sends it (RFC 3339, UTC, microseconds)
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an ISO-8601 timestamp from the wire.
///
/// Values without an offset (as produced by `timestamp without time zone`
/// columns) are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

mod wire_timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let ts = parse_timestamp("2024-03-15T12:30:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_naive_timestamp_as_utc() {
        let ts = parse_timestamp("2024-03-15T12:30:00.123456").unwrap();
        assert_eq!(ts.timestamp_subsec_micros(), 123456);
        assert_eq!(ts.format("%H:%M").to_string(), "12:30");

        let spaced = parse_timestamp("2024-03-15 12:30:00").unwrap();
        assert_eq!(spaced, Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_timestamp("yesterday-ish").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_format_timestamp_is_utc_micros() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 9, 5, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-15T09:05:00.000000Z");
    }

    #[test]
    fn test_message_from_store_json() {
        let json = r#"{"sender":"you","text":"hello","timestamp":"2024-03-15T09:05:00","id":"17"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.id.as_deref(), Some("17"));
        assert_eq!(msg.timestamp, Utc.with_ymd_and_hms(2024, 3, 15, 9, 5, 0).unwrap());
    }

    #[test]
    fn test_direction_uses_local_id_and_marker() {
        let alice = UserId::new("alice");
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 9, 5, 0).unwrap();
        assert_eq!(Message::new("alice", "a", ts).direction(&alice), Direction::Sent);
        assert_eq!(Message::new("me", "b", ts).direction(&alice), Direction::Sent);
        assert_eq!(Message::new("bob", "c", ts).direction(&alice), Direction::Received);
        assert!(UserId::new("me").is_outgoing_marker());
        assert!(!UserId::new("meg").is_outgoing_marker());
    }

    #[test]
    fn test_message_rejects_bad_timestamp() {
        let json = r#"{"sender":"you","text":"hello","timestamp":"not a time"}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn test_direction() {
        let me = UserId::new("alice");
        let ts = Utc::now();
        assert_eq!(Message::new("alice", "x", ts).direction(&me), Direction::Sent);
        assert_eq!(Message::new("me", "x", ts).direction(&me), Direction::Sent);
        assert_eq!(Message::new("you", "x", ts).direction(&me), Direction::Received);
        assert_eq!(Message::new("Alice", "x", ts).direction(&me), Direction::Received);
    }
}
