//! Token route — `POST /api/token`.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, info, warn};

use crate::provider::{MISCONFIGURED_MESSAGE, TokenRequest, TokenResponse};
use crate::state::AppState;
use crate::types::ASSISTANT_NAME;

const MISSING_FIELDS_MESSAGE: &str = "Missing roomName or username";
const ISSUE_FAILED_MESSAGE: &str = "Failed to generate token";
const RESERVED_NAME_MESSAGE: &str = "Username is reserved";

/// `POST /api/token` — issue a room token for `{ roomName, username }`.
pub async fn issue_token(State(state): State<AppState>, Json(body): Json<TokenRequest>) -> Response {
    let (status, body) = build_token_response(&state, &body);
    (status, Json(body)).into_response()
}

fn error_body(message: &str) -> TokenResponse {
    TokenResponse { error: Some(message.to_owned()), ..TokenResponse::default() }
}

/// Validate the request and sign a token. Pure so tests can call it directly.
pub(crate) fn build_token_response(state: &AppState, req: &TokenRequest) -> (StatusCode, TokenResponse) {
    let room = req.room_name.as_deref().map(str::trim).unwrap_or_default();
    let username = req.username.as_deref().map(str::trim).unwrap_or_default();
    if room.is_empty() || username.is_empty() {
        return (StatusCode::BAD_REQUEST, error_body(MISSING_FIELDS_MESSAGE));
    }
    // The relay marks the assistant's messages as AI; only the in-process
    // agent may sign in under that name.
    if username == ASSISTANT_NAME {
        warn!(%room, "token request refused: reserved username");
        return (StatusCode::FORBIDDEN, error_body(RESERVED_NAME_MESSAGE));
    }

    let (Some(config), Some(issuer)) = (&state.room_config, &state.issuer) else {
        warn!(%room, %username, "token request refused: signing config missing");
        return (StatusCode::INTERNAL_SERVER_ERROR, error_body(MISCONFIGURED_MESSAGE));
    };

    match issuer.issue(room, username) {
        Ok(token) => {
            info!(%room, %username, "issued room token");
            (
                StatusCode::OK,
                TokenResponse { token: Some(token), ws_url: Some(config.ws_url.clone()), error: None },
            )
        }
        Err(e) => {
            error!(error = %e, %room, %username, "token issue failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(ISSUE_FAILED_MESSAGE))
        }
    }
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
