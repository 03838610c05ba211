//! Shared server state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the (optional) signing configuration and a map of live rooms. Each
//! room tracks its connected members and the channel used to push frames to
//! each member's websocket task. Nothing is persisted: a room exists only
//! while it has members.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::RoomServerConfig;
use crate::token::TokenIssuer;
use crate::transport::wire::RelayFrame;
use crate::types::Participant;

// =============================================================================
// ROOM STATE
// =============================================================================

/// A connected relay client.
pub struct RoomMember {
    pub participant: Participant,
    /// Outgoing frames for this member's websocket task.
    pub tx: mpsc::Sender<RelayFrame>,
}

/// Per-room live membership.
#[derive(Default)]
pub struct RoomState {
    /// Members keyed by relay-assigned client id.
    pub members: HashMap<Uuid, RoomMember>,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum; inner fields are
/// Arc-wrapped or cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// `None` when signing env vars are incomplete; token requests then fail.
    pub room_config: Option<RoomServerConfig>,
    pub issuer: Option<TokenIssuer>,
    pub rooms: Arc<RwLock<HashMap<String, RoomState>>>,
}

impl AppState {
    #[must_use]
    pub fn new(room_config: Option<RoomServerConfig>) -> Self {
        let issuer = room_config.as_ref().map(TokenIssuer::from_config);
        Self { room_config, issuer, rooms: Arc::new(RwLock::new(HashMap::new())) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    pub const TEST_API_KEY: &str = "test-key";
    pub const TEST_API_SECRET: &str = "test-secret";
    pub const TEST_WS_URL: &str = "ws://rooms.test";

    #[must_use]
    pub fn test_room_config() -> RoomServerConfig {
        RoomServerConfig {
            api_key: TEST_API_KEY.into(),
            api_secret: TEST_API_SECRET.into(),
            ws_url: TEST_WS_URL.into(),
            token_ttl_secs: 3600,
        }
    }

    /// A configured `AppState` that can issue and verify tokens.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(Some(test_room_config()))
    }

    /// An `AppState` with no signing configuration.
    #[must_use]
    pub fn unconfigured_app_state() -> AppState {
        AppState::new(None)
    }

    /// Insert a member directly into a room and return its client id.
    pub async fn seed_member(state: &AppState, room: &str, username: &str, tx: mpsc::Sender<RelayFrame>) -> Uuid {
        let client_id = Uuid::new_v4();
        let mut rooms = state.rooms.write().await;
        rooms
            .entry(room.to_owned())
            .or_default()
            .members
            .insert(client_id, RoomMember { participant: Participant::new(username), tx });
        client_id
    }

    /// Bind the full router to an ephemeral local port and return its base
    /// address (`127.0.0.1:PORT`).
    pub async fn spawn_server(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let app = crate::routes::app(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr.to_string()
    }
}
