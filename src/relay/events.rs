//! Events exchanged over the relay socket.
//!
//! Each frame is `{"event": <name>, "data": {...}}`.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{messages::Message, RelayError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Join {
        username: String,
    },
    Leave {
        username: String,
    },
    SendMessage {
        from: String,
        to: String,
        message: String,
    },
    Typing {
        from: String,
        to: String,
        #[serde(default)]
        is_typing: bool,
    },
    RequestMessageHistory {
        user1: String,
        user2: String,
    },
}

impl ClientEvent {
    pub fn decode(frame: &[u8]) -> Result<Self, RelayError> {
        serde_json::from_slice(frame).map_err(|e| RelayError::validation(format!("invalid event: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        data: String,
    },
    UserStatus {
        username: String,
        online: bool,
    },
    ReceiveMessage {
        from: String,
        message: String,
        #[serde(rename = "originalMessage")]
        original_message: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    MessageSent {
        to: String,
        message: String,
        #[serde(rename = "translatedMessage")]
        translated_message: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    UserTyping {
        from: String,
        is_typing: bool,
    },
    MessageHistory {
        messages: Vec<Message>,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(err: &RelayError) -> Self {
        Self::Error { message: err.to_string() }
    }

    /// The receiver's copy of a stored message.
    pub fn received(message: &Message) -> Self {
        Self::ReceiveMessage {
            from: message.from.clone(),
            message: message.translated_text.clone(),
            original_message: message.original_text.clone(),
            timestamp: message.timestamp,
        }
    }

    /// The sender's echo of a stored message.
    pub fn sent(message: &Message) -> Self {
        Self::MessageSent {
            to: message.to.clone(),
            message: message.original_text.clone(),
            translated_message: message.translated_text.clone(),
            timestamp: message.timestamp,
        }
    }
}
