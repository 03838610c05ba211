use std::sync::Arc;

use roomchat::agent::{self, ChatAgent};
use roomchat::config::{self, RoomServerConfig};
use roomchat::error::ErrorCode;
use roomchat::llm::LlmClient;
use roomchat::provider::LocalTokenProvider;
use roomchat::transport::RoomClient;
use roomchat::transport::ws::WsRoomClient;
use roomchat::{routes, state};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port = config::port_from_lookup(|key| std::env::var(key).ok()).expect("invalid PORT");

    // Without signing config the server still runs; token requests fail.
    let room_config = match RoomServerConfig::from_env() {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(error = %e, code = e.error_code(), "room signing config incomplete; token requests will fail");
            None
        }
    };

    let agent_rooms = config::agent_rooms_from_lookup(|key| std::env::var(key).ok());
    let agent_provider = LocalTokenProvider::from_config(room_config.as_ref());
    let state = state::AppState::new(room_config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    // The listener is bound, so the assistant's connects queue until serve.
    if !agent_rooms.is_empty() {
        spawn_agents(agent_provider, agent_rooms, port);
    }

    tracing::info!(%port, "roomchat listening");
    axum::serve(listener, app).await.expect("server failed");
}

/// Seat the assistant in `rooms` on this server's own relay.
fn spawn_agents(provider: LocalTokenProvider, rooms: Vec<String>, port: u16) {
    let llm = match LlmClient::from_env() {
        Ok(llm) => llm,
        Err(e) => {
            tracing::warn!(error = %e, code = e.error_code(), "LLM config incomplete; assistant disabled");
            return;
        }
    };
    tracing::info!(model = llm.model(), rooms = ?rooms, "starting assistant");
    let chat_agent = Arc::new(ChatAgent::new(Arc::new(llm)));
    let room_url = format!("ws://127.0.0.1:{port}");

    tokio::spawn(async move {
        let factory = || Arc::new(WsRoomClient::new()) as Arc<dyn RoomClient>;
        let _seated = agent::join_rooms(chat_agent, &provider, &factory, &room_url, &rooms).await;
        // Hold the room bindings for the life of the process.
        std::future::pending::<()>().await;
    });
}
