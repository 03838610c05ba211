//! Relay wire frames.
//!
//! Every websocket text message between a room client and the relay is one
//! JSON object tagged by `type`:
//!
//! - `{"type":"data","payload":{...}}` in both directions
//! - `{"type":"roster","participants":[...]}` from the relay only

use serde::{Deserialize, Serialize};

use crate::types::{MessagePayload, Participant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayFrame {
    Data { payload: MessagePayload },
    Roster { participants: Vec<Participant> },
}

impl RelayFrame {
    /// Serialize to the JSON text carried in one websocket message.
    ///
    /// # Errors
    ///
    /// Returns a serialization error (not expected for these types).
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse one websocket text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a known frame.
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
