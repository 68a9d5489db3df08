//! Client → server messages.
//!
//! Frames are JSON objects discriminated by `type`. Unrecognised types decode
//! to [`ClientMessage::Unknown`] so the caller can log and ignore them; only
//! frames that are not JSON objects, or known types with a broken payload,
//! are errors.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Ping,
    JoinRoom { room_id: String },
    LeaveRoom { room_id: String },
    /// Join one room per channel name.
    Subscribe { channels: Vec<String> },
    Unsubscribe { channels: Vec<String> },
    Unknown(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientMessageError {
    #[error("message is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("message has no string `type` field")]
    MissingType,
    #[error("invalid `{kind}` message: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Wire shape of a client frame.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
enum Frame {
    Ping,
    JoinRoom {
        #[serde(deserialize_with = "non_empty")]
        room_id: String,
    },
    LeaveRoom {
        #[serde(deserialize_with = "non_empty")]
        room_id: String,
    },
    Subscribe(ChannelList),
    Unsubscribe(ChannelList),
    #[serde(other)]
    Other,
}

/// `channels: [..]` or a single `channel`.
#[derive(Deserialize)]
struct ChannelList {
    #[serde(default)]
    channel: Option<NonEmpty>,
    #[serde(default)]
    channels: Option<Vec<NonEmpty>>,
}

#[derive(Deserialize)]
struct NonEmpty(#[serde(deserialize_with = "non_empty")] String);

fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        return Err(serde::de::Error::custom("must not be empty"));
    }
    Ok(s)
}

impl ChannelList {
    fn into_channels(self) -> Result<Vec<String>, serde_json::Error> {
        match (self.channel, self.channels) {
            (Some(NonEmpty(single)), _) => Ok(vec![single]),
            (None, Some(list)) => Ok(list.into_iter().map(|NonEmpty(c)| c).collect()),
            (None, None) => Err(serde::de::Error::missing_field("channels")),
        }
    }
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, ClientMessageError> {
        let value: Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ClientMessageError::MissingType)?
            .to_string();

        let invalid = |source| ClientMessageError::InvalidPayload {
            kind: kind.clone(),
            source,
        };
        let msg = match Frame::deserialize(value).map_err(invalid)? {
            Frame::Ping => Self::Ping,
            Frame::JoinRoom { room_id } => Self::JoinRoom { room_id },
            Frame::LeaveRoom { room_id } => Self::LeaveRoom { room_id },
            Frame::Subscribe(list) => Self::Subscribe {
                channels: list.into_channels().map_err(invalid)?,
            },
            Frame::Unsubscribe(list) => Self::Unsubscribe {
                channels: list.into_channels().map_err(invalid)?,
            },
            Frame::Other => Self::Unknown(kind.clone()),
        };
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_types() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ping
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"join_room","roomId":"deal-7"}"#).unwrap(),
            ClientMessage::JoinRoom {
                room_id: "deal-7".into()
            }
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"subscribe","channels":["a","b"]}"#).unwrap(),
            ClientMessage::Subscribe {
                channels: vec!["a".into(), "b".into()]
            }
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"unsubscribe","channel":"a"}"#).unwrap(),
            ClientMessage::Unsubscribe {
                channels: vec!["a".into()]
            }
        );
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"dance"}"#).unwrap(),
            ClientMessage::Unknown("dance".into())
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"dance","roomId":7}"#).unwrap(),
            ClientMessage::Unknown("dance".into())
        );
    }

    #[test]
    fn test_rejects_malformed_frames() {
        assert!(matches!(
            ClientMessage::parse("not json"),
            Err(ClientMessageError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse("[1,2]"),
            Err(ClientMessageError::MissingType)
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"join_room"}"#),
            Err(ClientMessageError::InvalidPayload { .. })
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"subscribe","channels":[1]}"#),
            Err(ClientMessageError::InvalidPayload { .. })
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"subscribe"}"#),
            Err(ClientMessageError::InvalidPayload { kind, .. }) if kind == "subscribe"
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"leave_room","roomId":""}"#),
            Err(ClientMessageError::InvalidPayload { .. })
        ));
    }
}
