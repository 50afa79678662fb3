//! Chat wire protocol
//!
//! JSON objects tagged by `type`. A connection sends `join` first; the server
//! answers `joined` with the message history and from then on pushes every
//! `message` the connection is addressed by.

use serde::{Deserialize, Serialize};
use tungstenite::protocol::Message as WsMessage;

use crate::utils::error::TransportError;

/// Username reserved for notices generated by the server.
pub const SYSTEM_USERNAME: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    pub body: String,
    /// Milliseconds since UNIX epoch, set by the server.
    pub sent_at: i64,
}

impl ChatMessage {
    pub fn new(username: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            body: body.into(),
            sent_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn system(body: impl Into<String>) -> Self {
        Self::new(SYSTEM_USERNAME, body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join { username: String },
    Send { body: String },
    Direct { to: Vec<String>, body: String },
    History,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined {
        username: String,
        history: Vec<ChatMessage>,
    },
    Message {
        message: ChatMessage,
    },
    History {
        messages: Vec<ChatMessage>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serializes into a WebSocket text frame.
    pub fn encode(&self) -> Result<WsMessage, TransportError> {
        Ok(WsMessage::text(serde_json::to_string(self)?))
    }
}
