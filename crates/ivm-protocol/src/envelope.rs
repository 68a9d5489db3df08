//! Server → client frames.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Current time as an ISO-8601 UTC string with millisecond precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Domain event pushed to clients: `{type, data, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
    pub timestamp: String,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: now_timestamp(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Control frames produced by the gateway itself rather than by a domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Connection { message: String, timestamp: String },
    Pong { timestamp: String },
    Error { message: String, timestamp: String },
    RoomJoined { room_id: String, timestamp: String },
    RoomLeft { room_id: String, timestamp: String },
    Subscribed { channels: Vec<String>, timestamp: String },
    Unsubscribed { channels: Vec<String>, timestamp: String },
}

impl ServerMessage {
    pub fn connection() -> Self {
        Self::Connection {
            message: crate::CONNECTED_MESSAGE.to_string(),
            timestamp: now_timestamp(),
        }
    }

    pub fn pong() -> Self {
        Self::Pong {
            timestamp: now_timestamp(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp: now_timestamp(),
        }
    }

    pub fn room_joined(room_id: impl Into<String>) -> Self {
        Self::RoomJoined {
            room_id: room_id.into(),
            timestamp: now_timestamp(),
        }
    }

    pub fn room_left(room_id: impl Into<String>) -> Self {
        Self::RoomLeft {
            room_id: room_id.into(),
            timestamp: now_timestamp(),
        }
    }

    pub fn subscribed(channels: Vec<String>) -> Self {
        Self::Subscribed {
            channels,
            timestamp: now_timestamp(),
        }
    }

    pub fn unsubscribed(channels: Vec<String>) -> Self {
        Self::Unsubscribed {
            channels,
            timestamp: now_timestamp(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
