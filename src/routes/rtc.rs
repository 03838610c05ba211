//! Relay websocket — `GET /rtc?access_token=…`.
//!
//! LIFECYCLE
//! =========
//! 1. Verify the access token → identity + room from its claims
//! 2. Upgrade, join the room, every member gets a fresh roster
//! 3. `select!` loop: inbound data frames fan out to the other members with
//!    `sender` stamped from the token; frames queued for this member are
//!    written to the socket
//! 4. Close → part the room, remaining members get a fresh roster, then the
//!    close reply is flushed so a client that waits for it knows it is gone

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services;
use crate::state::AppState;
use crate::token::Claims;
use crate::transport::wire::RelayFrame;
use crate::types::{ASSISTANT_NAME, Participant, normalize_text};

pub async fn handle_rtc(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(issuer) = &state.issuer else {
        return (StatusCode::SERVICE_UNAVAILABLE, "room server not configured").into_response();
    };
    let Some(token) = params.get("access_token") else {
        return (StatusCode::UNAUTHORIZED, "access_token required").into_response();
    };

    let claims = match issuer.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, "rtc: token rejected");
            return (StatusCode::UNAUTHORIZED, "invalid or expired token").into_response();
        }
    };
    if !claims.video.room_join {
        return (StatusCode::FORBIDDEN, "token does not grant room join").into_response();
    }

    ws.on_upgrade(move |socket| run_rtc(socket, state, claims))
}

async fn run_rtc(mut socket: WebSocket, state: AppState, claims: Claims) {
    let client_id = Uuid::new_v4();
    let room_id = claims.video.room.clone();
    let identity = claims.sub.clone();

    let (client_tx, mut client_rx) = mpsc::channel::<RelayFrame>(256);
    services::room::join_room(&state, &room_id, client_id, Participant::new(&identity), client_tx).await;
    info!(%client_id, %room_id, %identity, "rtc: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        handle_inbound(&state, &claims, client_id, text.as_str()).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    services::room::part_room(&state, &room_id, client_id).await;
    let _ = socket.send(Message::Close(None)).await;
    info!(%client_id, %room_id, %identity, "rtc: client disconnected");
}

/// Parse one inbound text message and relay it if it is publishable.
async fn handle_inbound(state: &AppState, claims: &Claims, client_id: Uuid, text: &str) {
    let frame = match RelayFrame::from_text(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(%client_id, error = %e, "rtc: invalid inbound frame");
            return;
        }
    };

    match frame {
        RelayFrame::Data { mut payload } => {
            if !claims.video.can_publish {
                warn!(%client_id, "rtc: publish without grant dropped");
                return;
            }
            let Some(text) = normalize_text(&payload.text) else {
                return;
            };
            // Sender and assistant flag come from the token, never the client.
            payload.text = text;
            payload.sender.clone_from(&claims.sub);
            payload.is_ai = claims.sub == ASSISTANT_NAME;
            services::room::broadcast_data(state, &claims.video.room, &payload, Some(client_id)).await;
        }
        RelayFrame::Roster { .. } => {
            warn!(%client_id, "rtc: clients may not publish rosters");
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &RelayFrame) -> Result<(), ()> {
    let text = match frame.to_text() {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "rtc: failed to serialize frame");
            return Err(());
        }
    };
    socket
        .send(Message::Text(text.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "rtc_test.rs"]
mod tests;
