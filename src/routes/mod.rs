//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the token endpoint, the relay websocket and a health check under a
//! single Axum router. CORS is wide open so browser clients served from any
//! origin can fetch tokens.

pub mod rtc;
pub mod token;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/token", post(token::issue_token))
        .route("/rtc", get(rtc::handle_rtc))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
