//! # Chat Protocol Messages
//!
//! Defines the envelopes exchanged between the chat client and the
//! conversational backend. Every frame is a JSON text frame using serde's
//! adjacently-tagged representation: the variant name lives in a `"type"`
//! field and the payload (if any) in a `"content"` field, e.g.
//! `{"type": "typing", "content": true}`.
//!
//! Both sides share these types, so the client and the server can never
//! drift apart on the wire format.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Client → Server ────────────────────────────────────────────

/// Messages sent by the client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Text typed (or spoken) by the user.
    Message(String),

    /// Ask the server to forget the conversation history of this session.
    ClearSession,

    /// Ask the server to describe the current session.
    GetSessionInfo,
}

// ─── Server → Client ────────────────────────────────────────────

/// Messages sent by the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A reply from the agent.
    Response(String),

    /// Whether the agent is currently composing a reply.
    Typing(bool),

    /// An application-level failure reported by the server.
    Error(String),

    /// Confirms that the session history was cleared.
    SessionCleared(String),

    /// Describes the current session.
    SessionInfo(SessionInfo),
}

/// Summary of a server-side session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,

    /// Number of user and agent messages exchanged so far.
    pub message_count: usize,

    /// RFC 3339 timestamp of when the session started.
    pub started_at: String,
}

// ─── Tolerant Decoding ──────────────────────────────────────────

/// An envelope type with a fixed, known set of `"type"` tags.
pub trait Envelope: DeserializeOwned {
    /// Every tag this envelope understands.
    const TAGS: &'static [&'static str];

    /// Payload assumed for `tag` when a frame omits `"content"`.
    fn default_content(_tag: &str) -> Option<Value> {
        None
    }
}

impl Envelope for ClientMessage {
    const TAGS: &'static [&'static str] = &["message", "clear_session", "get_session_info"];

    /// A `message` without content is an empty message, not a malformed one.
    fn default_content(tag: &str) -> Option<Value> {
        (tag == "message").then(|| Value::String(String::new()))
    }
}

impl Envelope for ServerMessage {
    const TAGS: &'static [&'static str] = &[
        "response",
        "typing",
        "error",
        "session_cleared",
        "session_info",
    ];
}

/// Result of decoding a text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    /// A well-formed envelope with a known tag.
    Known(T),

    /// A well-formed JSON object whose tag this side does not understand.
    Unrecognized(String),
}

/// Decodes a text frame into an envelope.
///
/// Unknown tags are not an error: they come back as
/// [`Decoded::Unrecognized`] so the caller can ignore them. Invalid JSON, a
/// missing `"type"` field, or a known tag with the wrong payload shape are
/// errors.
pub fn decode<T: Envelope>(text: &str) -> Result<Decoded<T>, serde_json::Error> {
    let mut value: Value = serde_json::from_str(text)?;
    let tag = match value.get("type").and_then(Value::as_str) {
        Some(tag) => tag.to_owned(),
        None => {
            return Err(<serde_json::Error as serde::de::Error>::custom(
                "envelope has no string `type` field",
            ))
        }
    };
    if !T::TAGS.contains(&tag.as_str()) {
        return Ok(Decoded::Unrecognized(tag));
    }
    if let Some(object) = value.as_object_mut() {
        if !object.contains_key("content") {
            if let Some(content) = T::default_content(&tag) {
                object.insert("content".to_owned(), content);
            }
        }
    }
    serde_json::from_value(value).map(Decoded::Known)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn client_messages_use_the_documented_shape() {
        let text = serde_json::to_value(ClientMessage::Message("hi there".into())).unwrap();
        assert_eq!(text, json!({"type": "message", "content": "hi there"}));

        let clear = serde_json::to_value(ClientMessage::ClearSession).unwrap();
        assert_eq!(clear, json!({"type": "clear_session"}));
    }

    #[test]
    fn server_messages_ignore_extra_fields() {
        let frame = r#"{"type":"response","content":"Hello","timestamp":"2024-05-01T10:00:00Z"}"#;
        assert_eq!(
            decode::<ServerMessage>(frame).unwrap(),
            Decoded::Known(ServerMessage::Response("Hello".into()))
        );
    }

    #[test]
    fn typing_carries_a_bool() {
        assert_eq!(
            decode::<ServerMessage>(r#"{"type":"typing","content":false}"#).unwrap(),
            Decoded::Known(ServerMessage::Typing(false))
        );
    }

    #[test]
    fn unknown_tags_are_reported_not_rejected() {
        assert_eq!(
            decode::<ServerMessage>(r#"{"type":"broadcast","content":{"x":1}}"#).unwrap(),
            Decoded::Unrecognized("broadcast".into())
        );
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(decode::<ServerMessage>("not json").is_err());
        assert!(decode::<ServerMessage>(r#"{"content":"no tag"}"#).is_err());
        assert!(decode::<ServerMessage>(r#"{"type":"typing","content":"yes"}"#).is_err());
        assert_matches!(decode::<ServerMessage>("[1, 2]"), Err(_));
    }

    #[test]
    fn message_without_content_is_empty() {
        assert_eq!(
            decode::<ClientMessage>(r#"{"type":"message"}"#).unwrap(),
            Decoded::Known(ClientMessage::Message(String::new()))
        );
        assert_eq!(
            decode::<ClientMessage>(r#"{"type":"get_session_info"}"#).unwrap(),
            Decoded::Known(ClientMessage::GetSessionInfo)
        );
        // Only client messages have a default payload.
        assert!(decode::<ServerMessage>(r#"{"type":"response"}"#).is_err());
    }

    #[test]
    fn session_info_round_trips_through_the_decoder() {
        let info = SessionInfo {
            session_id: "abc".into(),
            message_count: 4,
            started_at: "2024-05-01T10:00:00+00:00".into(),
        };
        let frame = serde_json::to_string(&ServerMessage::SessionInfo(info.clone())).unwrap();
        assert_eq!(
            decode::<ServerMessage>(&frame).unwrap(),
            Decoded::Known(ServerMessage::SessionInfo(info))
        );
    }
}
