//! Chat data model shared by the session managers, the transport and the relay.
//!
//! DESIGN
//! ======
//! `MessagePayload` is the wire form published on a room's data channel.
//! `ChatMessage` is the local, immutable record appended to a session's
//! history once a payload is accepted. Field names serialize in camelCase so
//! payloads stay compatible with browser clients (`isAI`, `joinedAt`).

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Display name used for every assistant-authored message.
pub const ASSISTANT_NAME: &str = "AI Assistant";

/// Upper bound on message text, in characters.
pub const MAX_MESSAGE_LEN: usize = 500;

// =============================================================================
// MESSAGES
// =============================================================================

/// A message as published on (and received from) the room data channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub text: String,
    pub sender: String,
    #[serde(rename = "isAI", default)]
    pub is_ai: bool,
}

impl MessagePayload {
    #[must_use]
    pub fn human(text: impl Into<String>, sender: impl Into<String>) -> Self {
        Self { text: text.into(), sender: sender.into(), is_ai: false }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self { text: text.into(), sender: ASSISTANT_NAME.to_owned(), is_ai: true }
    }
}

/// One entry in a session's message history. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(rename = "isAI")]
    pub is_ai: bool,
}

impl ChatMessage {
    /// Stamp a payload with a fresh id and the current time.
    #[must_use]
    pub fn from_payload(payload: MessagePayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: payload.text,
            sender: payload.sender,
            timestamp: OffsetDateTime::now_utc(),
            is_ai: payload.is_ai,
        }
    }
}

/// Trim user input and clip it to [`MAX_MESSAGE_LEN`] characters.
///
/// Returns `None` when nothing is left after trimming.
#[must_use]
pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.char_indices().nth(MAX_MESSAGE_LEN) {
        Some((cut, _)) => Some(trimmed[..cut].trim_end().to_owned()),
        None => Some(trimmed.to_owned()),
    }
}

// =============================================================================
// PARTICIPANTS
// =============================================================================

/// A roster entry. Replaced or removed as a whole, never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub username: String,
    pub is_connected: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

impl Participant {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            is_connected: true,
            joined_at: OffsetDateTime::now_utc(),
        }
    }
}

// =============================================================================
// SESSION VIEW
// =============================================================================

/// Lifecycle position of a session manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

/// Read-only snapshot of a session, as exposed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub messages: Vec<ChatMessage>,
    pub participants: Vec<Participant>,
    pub is_connected: bool,
    pub is_sending: bool,
    pub current_user: String,
    pub room_id: String,
    pub phase: ConnectionPhase,
}

impl SessionView {
    /// Messages authored by the assistant, in display order.
    pub fn assistant_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.is_ai)
    }

    #[must_use]
    pub fn has_participant(&self, username: &str) -> bool {
        self.participants.iter().any(|p| p.username == username)
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
