//! Room assistant — answers `@agent` mentions through an LLM.
//!
//! LIFECYCLE
//! =========
//! 1. `RoomAgent::join` fetches a token for [`ASSISTANT_NAME`], connects a
//!    room client and posts a short intro
//! 2. Every data message goes through [`ChatAgent::respond`]: assistant
//!    messages and messages without the trigger are ignored, otherwise the
//!    mention is stripped and the LLM is asked for a reply
//! 3. The reply (or a fixed apology when the LLM fails) is published as an
//!    assistant message
//! 4. `leave` stops the reply loop and disconnects
//!
//! The assistant keeps no memory between messages.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ErrorCode;
use crate::llm::{LlmChat, Message};
use crate::provider::{ProviderError, TokenProvider};
use crate::transport::{RoomClient, RoomClientFactory, TransportError};
use crate::types::{ASSISTANT_NAME, MessagePayload, normalize_text};

/// Mention that addresses the assistant, matched case-insensitively.
pub const AGENT_TRIGGER: &str = "@agent";
pub const INTRO_MESSAGE: &str = "🤖 AI Assistant has joined the chat! Mention @agent to talk to me.";
pub const ERROR_REPLY: &str = "Sorry, I encountered an error processing your message.";
pub const EMPTY_REPLY: &str = "I'm sorry, I couldn't generate a response right now.";
/// Prompt used when nothing is left after removing the mention.
pub const DEFAULT_PROMPT: &str = "Hello";

const MAX_REPLY_TOKENS: u32 = 512;

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant in a group chat.\n\
Key guidelines:\n\
- Be conversational and friendly\n\
- Keep responses concise (1-3 sentences typically)\n\
- Be helpful but not overly verbose in group settings";

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent token request failed: {0}")]
    Token(#[from] ProviderError),
    #[error("agent transport failed: {0}")]
    Transport(#[from] TransportError),
}

impl ErrorCode for AgentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Token(e) => e.error_code(),
            Self::Transport(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Token(e) => e.retryable(),
            Self::Transport(e) => e.retryable(),
        }
    }
}

// =============================================================================
// RESPONDER
// =============================================================================

/// Decides whether and how to answer one room message.
pub struct ChatAgent {
    llm: Arc<dyn LlmChat>,
}

impl ChatAgent {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmChat>) -> Self {
        Self { llm }
    }

    /// Reply text for `payload`, or `None` when the assistant stays quiet.
    pub async fn respond(&self, payload: &MessagePayload) -> Option<String> {
        if payload.is_ai || payload.sender == ASSISTANT_NAME {
            return None;
        }
        if find_trigger(&payload.text).is_none() {
            return None;
        }

        let cleaned = strip_trigger(&payload.text);
        let prompt = if cleaned.is_empty() { DEFAULT_PROMPT } else { cleaned.as_str() };
        debug!(sender = %payload.sender, %prompt, "agent: mentioned");

        let message = Message::user(format!("Current message from {}: {prompt}", payload.sender));
        match self.llm.chat(MAX_REPLY_TOKENS, SYSTEM_PROMPT, &[message]).await {
            Ok(response) => Some(normalize_text(&response.text).unwrap_or_else(|| EMPTY_REPLY.to_owned())),
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "agent: llm request failed");
                Some(ERROR_REPLY.to_owned())
            }
        }
    }
}

/// Byte offset of the first trigger mention, ignoring ASCII case.
fn find_trigger(text: &str) -> Option<usize> {
    text.as_bytes()
        .windows(AGENT_TRIGGER.len())
        .position(|w| w.eq_ignore_ascii_case(AGENT_TRIGGER.as_bytes()))
}

/// Remove every trigger mention and trim the rest.
#[must_use]
pub fn strip_trigger(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    // The trigger is ASCII, so match offsets are char boundaries.
    while let Some(idx) = find_trigger(rest) {
        out.push_str(&rest[..idx]);
        rest = &rest[idx + AGENT_TRIGGER.len()..];
    }
    out.push_str(rest);
    out.trim().to_owned()
}

// =============================================================================
// ROOM BINDING
// =============================================================================

/// The assistant seated in one room.
pub struct RoomAgent {
    room_id: String,
    client: Arc<dyn RoomClient>,
    task: JoinHandle<()>,
}

impl RoomAgent {
    /// Connect `client` to `room_id` as the assistant and start answering.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be fetched or the client cannot
    /// connect.
    pub async fn join(
        agent: Arc<ChatAgent>,
        provider: &dyn TokenProvider,
        client: Arc<dyn RoomClient>,
        room_url: &str,
        room_id: &str,
    ) -> Result<Self, AgentError> {
        let token = provider.fetch_token(room_id, ASSISTANT_NAME).await?;

        let (tx, mut inbox) = mpsc::unbounded_channel::<MessagePayload>();
        client.on_message(Box::new(move |payload| {
            let _ = tx.send(payload);
        }));
        client.connect(room_url, &token).await?;

        if let Err(e) = client.send_message(&MessagePayload::assistant(INTRO_MESSAGE)).await {
            warn!(error = %e, %room_id, "agent: intro not delivered");
        }
        info!(%room_id, "agent: joined room");

        let task = tokio::spawn({
            let client = Arc::clone(&client);
            let room_id = room_id.to_owned();
            async move {
                while let Some(payload) = inbox.recv().await {
                    let Some(reply) = agent.respond(&payload).await else { continue };
                    if let Err(e) = client.send_message(&MessagePayload::assistant(reply)).await {
                        warn!(error = %e, %room_id, "agent: reply not delivered");
                    }
                }
            }
        });

        Ok(Self { room_id: room_id.to_owned(), client, task })
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Stop answering and disconnect from the room.
    pub async fn leave(self) {
        self.task.abort();
        self.client.disconnect().await;
        info!(room_id = %self.room_id, "agent: left room");
    }
}

impl Drop for RoomAgent {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Seat the assistant in each of `rooms`, skipping rooms that fail to join.
pub async fn join_rooms(
    agent: Arc<ChatAgent>,
    provider: &dyn TokenProvider,
    factory: &dyn RoomClientFactory,
    room_url: &str,
    rooms: &[String],
) -> Vec<RoomAgent> {
    let mut seated = Vec::with_capacity(rooms.len());
    for room_id in rooms {
        match RoomAgent::join(Arc::clone(&agent), provider, factory.create(), room_url, room_id).await {
            Ok(room_agent) => seated.push(room_agent),
            Err(e) => warn!(error = %e, code = e.error_code(), %room_id, "agent: failed to join room"),
        }
    }
    seated
}

#[cfg(test)]
#[path = "agent_test.rs"]
mod tests;
