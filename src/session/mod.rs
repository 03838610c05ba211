//! Chat session managers.
//!
//! ARCHITECTURE
//! ============
//! A session manager owns one user's view of one room: the message history,
//! the remote roster, and the connection and sending flags. Two managers
//! share the [`ChatSession`] trait:
//! - [`LiveSession`] fetches a token and binds a [`RoomClient`] per
//!   (room, identity) pair.
//! - [`MockSession`] simulates the same lifecycle with scripted assistant
//!   messages and randomized participant churn.
//!
//! Each manager is an actor: a spawned task owns the state, intents arrive on
//! a command channel and are answered over oneshot replies, and every change
//! is published through a `watch` channel as a [`SessionView`]. Transport
//! notifications and timer firings are tagged with the binding generation
//! that produced them so nothing from a torn-down binding touches the state.
//!
//! [`RoomClient`]: crate::transport::RoomClient

pub mod live;
pub mod mock;
pub mod random;
mod store;
mod timers;

use tokio::sync::{mpsc, oneshot, watch};

use crate::error::ErrorCode;
use crate::provider::ProviderError;
use crate::transport::TransportError;
use crate::types::SessionView;

pub use live::LiveSession;
pub use mock::{MockSession, MockTimings};
pub use random::{RandomSource, RngSource, ScriptedSource};

// =============================================================================
// ERRORS & OUTCOMES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token request failed: {0}")]
    TokenRequest(String),
    #[error("transport connect failed: {0}")]
    TransportConnect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("room and identity are required")]
    InvalidJoin,
    #[error("join cancelled")]
    Cancelled,
    #[error("session closed")]
    Closed,
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "E_CONFIGURATION",
            Self::TokenRequest(_) => "E_TOKEN_REQUEST",
            Self::TransportConnect(_) => "E_TRANSPORT_CONNECT",
            Self::Send(_) => "E_SEND",
            Self::InvalidJoin => "E_INVALID_JOIN",
            Self::Cancelled => "E_CANCELLED",
            Self::Closed => "E_SESSION_CLOSED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::TokenRequest(_) | Self::TransportConnect(_))
    }
}

impl From<ProviderError> for SessionError {
    fn from(err: ProviderError) -> Self {
        if matches!(err, ProviderError::Misconfigured) {
            Self::Configuration(err.to_string())
        } else {
            Self::TokenRequest(err.to_string())
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connect(msg) => Self::TransportConnect(msg),
            other => Self::Send(other.to_string()),
        }
    }
}

/// Result of a successful `join` intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// This call established the binding.
    Connected,
    /// The same pair is already being connected; nothing was started.
    AlreadyConnecting,
    /// The same pair is already connected; nothing was started.
    AlreadyConnected,
}

/// Result of a `send` intent. Only `Sent` changes the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    NotConnected,
    /// A previous send still holds the in-flight guard.
    Busy,
    /// Nothing left after trimming.
    Empty,
}

// =============================================================================
// TRAIT
// =============================================================================

/// Intents a presentation layer can issue, plus read access to the state.
#[async_trait::async_trait]
pub trait ChatSession: Send + Sync {
    /// Bind to `room_id` as `identity`, resolving once connected.
    ///
    /// # Errors
    ///
    /// Returns the connect-path failure; the session is then `Disconnected`.
    async fn join(&self, room_id: &str, identity: &str) -> Result<JoinOutcome, SessionError>;

    /// Send a chat message. The optimistic echo is in the view when this
    /// returns; delivery completes in the background.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the manager task is gone.
    async fn send(&self, text: &str) -> Result<SendOutcome, SessionError>;

    /// Tear down the binding. History is kept.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the manager task is gone.
    async fn leave(&self) -> Result<(), SessionError>;

    fn subscribe(&self) -> watch::Receiver<SessionView>;

    fn view(&self) -> SessionView {
        self.subscribe().borrow().clone()
    }
}

// =============================================================================
// ACTOR PLUMBING
// =============================================================================

pub(crate) type JoinReply = oneshot::Sender<Result<JoinOutcome, SessionError>>;

pub(crate) enum Command {
    Join { room_id: String, identity: String, reply: JoinReply },
    Send { text: String, reply: oneshot::Sender<SendOutcome> },
    Leave { reply: oneshot::Sender<()> },
}

/// Caller side of a manager actor. Dropping it stops the actor.
pub(crate) struct Handle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SessionView>,
}

impl Handle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>, view: watch::Receiver<SessionView>) -> Self {
        Self { commands, view }
    }

    pub(crate) async fn join(&self, room_id: &str, identity: &str) -> Result<JoinOutcome, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Join { room_id: room_id.to_owned(), identity: identity.to_owned(), reply })
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub(crate) async fn send(&self, text: &str) -> Result<SendOutcome, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Send { text: text.to_owned(), reply })
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub(crate) async fn leave(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Leave { reply })
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }
}

/// Trim a join request. Both parts must be non-empty.
pub(crate) fn validate_join(room_id: &str, identity: &str) -> Result<(String, String), SessionError> {
    let room_id = room_id.trim();
    let identity = identity.trim();
    if room_id.is_empty() || identity.is_empty() {
        return Err(SessionError::InvalidJoin);
    }
    Ok((room_id.to_owned(), identity.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_map_to_session_errors() {
        assert!(matches!(SessionError::from(ProviderError::Misconfigured), SessionError::Configuration(_)));
        assert!(matches!(SessionError::from(ProviderError::MissingToken), SessionError::TokenRequest(_)));
        assert!(matches!(
            SessionError::from(ProviderError::Unreachable("refused".into())),
            SessionError::TokenRequest(_)
        ));
    }

    #[test]
    fn transport_errors_map_to_session_errors() {
        assert_eq!(
            SessionError::from(TransportError::Connect("refused".into())),
            SessionError::TransportConnect("refused".into())
        );
        assert!(matches!(SessionError::from(TransportError::NotConnected), SessionError::Send(_)));
    }

    #[test]
    fn retryable_only_for_connect_path_io() {
        assert!(SessionError::TokenRequest(String::new()).retryable());
        assert!(SessionError::TransportConnect(String::new()).retryable());
        assert!(!SessionError::Configuration(String::new()).retryable());
        assert!(!SessionError::InvalidJoin.retryable());
        assert_eq!(SessionError::Configuration(String::new()).error_code(), "E_CONFIGURATION");
    }

    #[test]
    fn validate_join_trims_and_rejects_blanks() {
        assert_eq!(validate_join(" lobby ", " alice "), Ok(("lobby".into(), "alice".into())));
        assert_eq!(validate_join("", "alice"), Err(SessionError::InvalidJoin));
        assert_eq!(validate_join("lobby", "   "), Err(SessionError::InvalidJoin));
    }
}
