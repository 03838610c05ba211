//! Room transport capability.
//!
//! DESIGN
//! ======
//! A [`RoomClient`] is one connection to one room: it connects with a URL and
//! an access token, publishes message payloads, and reports received
//! payloads and roster snapshots through registered handlers. Session
//! managers create a fresh client per binding via a [`RoomClientFactory`], so
//! any implementation (websocket, in-memory, test double) is interchangeable.

pub mod wire;
pub mod ws;

use std::sync::Arc;

use crate::error::ErrorCode;
use crate::types::{MessagePayload, Participant};

/// Invoked once per payload received from another room member.
pub type MessageHandler = Box<dyn Fn(MessagePayload) + Send + Sync>;

/// Invoked with the full remote roster whenever membership changes.
pub type RosterHandler = Box<dyn Fn(Vec<Participant>) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("not connected")]
    NotConnected,
    #[error("publish failed: {0}")]
    Publish(String),
}

impl ErrorCode for TransportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "E_TRANSPORT_CONNECT",
            Self::NotConnected => "E_TRANSPORT_NOT_CONNECTED",
            Self::Publish(_) => "E_TRANSPORT_PUBLISH",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}

/// One connection to a room.
///
/// Handlers are registered before `connect` and may fire from any task, any
/// number of times, until `disconnect` returns. `disconnect` is idempotent.
#[async_trait::async_trait]
pub trait RoomClient: Send + Sync {
    fn on_message(&self, handler: MessageHandler);

    fn on_participants(&self, handler: RosterHandler);

    async fn connect(&self, url: &str, token: &str) -> Result<(), TransportError>;

    async fn send_message(&self, payload: &MessagePayload) -> Result<(), TransportError>;

    async fn disconnect(&self);
}

/// Creates a fresh, unconnected [`RoomClient`] for each session binding.
pub trait RoomClientFactory: Send + Sync {
    fn create(&self) -> Arc<dyn RoomClient>;
}

impl<F> RoomClientFactory for F
where
    F: Fn() -> Arc<dyn RoomClient> + Send + Sync,
{
    fn create(&self) -> Arc<dyn RoomClient> {
        self()
    }
}
