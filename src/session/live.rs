//! Live session manager — token provider + room client.
//!
//! LIFECYCLE
//! =========
//! `Idle → Connecting → Connected → Disconnected`
//!
//! 1. `join` bumps the generation, points the view at the pair, creates a
//!    fresh client with handlers tagged by that generation and spawns the
//!    connect attempt (fetch token, then connect)
//! 2. The attempt settles back into the actor. Success marks the session
//!    connected and schedules the one-shot welcome; failure disconnects the
//!    client and leaves the session `Disconnected`
//! 3. Remote messages are appended unless the sender is the current
//!    identity; roster snapshots replace the participant list
//! 4. `leave` (or dropping the handle) bumps the generation, cancels timers,
//!    aborts any attempt and disconnects every client it holds
//!
//! A join for a different pair while an attempt is in flight is queued and
//! started once that attempt settles and is torn down, so at most one client
//! is ever connected.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::Store;
use super::timers::Timers;
use super::{ChatSession, Command, Handle, JoinOutcome, JoinReply, SendOutcome, SessionError, validate_join};
use crate::config::ClientConfig;
use crate::error::ErrorCode;
use crate::provider::{HttpTokenProvider, TokenProvider};
use crate::transport::ws::WsRoomClient;
use crate::transport::{RoomClient, RoomClientFactory, TransportError};
use crate::types::{ConnectionPhase, MessagePayload, Participant, SessionView, normalize_text};

/// Delay between connecting and the assistant's welcome message.
pub const WELCOME_DELAY: Duration = Duration::from_secs(1);

#[must_use]
pub fn welcome_text(identity: &str) -> String {
    format!("Welcome to the room, {identity}! I'm your AI assistant. How can I help you today?")
}

/// Session manager bound to a real room transport.
pub struct LiveSession {
    handle: Handle,
}

impl LiveSession {
    /// Spawn the manager task. Must be called within a Tokio runtime.
    #[must_use]
    pub fn spawn(
        provider: Arc<dyn TokenProvider>,
        factory: Arc<dyn RoomClientFactory>,
        room_url: impl Into<String>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let store = Store::new();
        let view = store.subscribe();

        let actor = Actor {
            provider,
            factory,
            room_url: room_url.into(),
            store,
            timers: Timers::new(events_tx.clone()),
            events: events_tx,
            generation: 0,
            binding: None,
            connecting: false,
            connected: false,
            welcomed: false,
            sending: false,
            client: None,
            pending: None,
            attempt: None,
            waiter: None,
            queued: None,
        };
        tokio::spawn(actor.run(cmd_rx, events_rx));

        Self { handle: Handle::new(cmd_tx, view) }
    }

    /// Websocket client + HTTP token endpoint from client configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        let provider: Arc<dyn TokenProvider> = Arc::new(HttpTokenProvider::from_config(config));
        let factory: Arc<dyn RoomClientFactory> = Arc::new(|| Arc::new(WsRoomClient::new()) as Arc<dyn RoomClient>);
        Self::spawn(provider, factory, config.room_url.clone())
    }
}

#[async_trait::async_trait]
impl ChatSession for LiveSession {
    async fn join(&self, room_id: &str, identity: &str) -> Result<JoinOutcome, SessionError> {
        self.handle.join(room_id, identity).await
    }

    async fn send(&self, text: &str) -> Result<SendOutcome, SessionError> {
        self.handle.send(text).await
    }

    async fn leave(&self) -> Result<(), SessionError> {
        self.handle.leave().await
    }

    fn subscribe(&self) -> tokio::sync::watch::Receiver<SessionView> {
        self.handle.subscribe()
    }
}

// =============================================================================
// ACTOR
// =============================================================================

struct Tagged {
    generation: u64,
    event: Event,
}

enum Event {
    /// The connect attempt finished.
    Settled { client: Arc<dyn RoomClient>, result: Result<(), SessionError> },
    Message(MessagePayload),
    Roster(Vec<Participant>),
    Welcome,
    SendFinished(Result<(), TransportError>),
}

struct JoinRequest {
    room_id: String,
    identity: String,
    reply: JoinReply,
}

struct Binding {
    room_id: String,
    identity: String,
}

struct Actor {
    provider: Arc<dyn TokenProvider>,
    factory: Arc<dyn RoomClientFactory>,
    room_url: String,
    store: Store,
    events: mpsc::UnboundedSender<Tagged>,
    timers: Timers<Tagged>,
    generation: u64,
    binding: Option<Binding>,
    connecting: bool,
    connected: bool,
    /// Set once the welcome has been appended; never reset.
    welcomed: bool,
    sending: bool,
    client: Option<Arc<dyn RoomClient>>,
    /// Client of the in-flight attempt.
    pending: Option<Arc<dyn RoomClient>>,
    attempt: Option<JoinHandle<()>>,
    waiter: Option<JoinReply>,
    queued: Option<JoinRequest>,
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, mut events: mpsc::UnboundedReceiver<Tagged>) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command).await;
                }
                Some(tagged) = events.recv() => self.handle_event(tagged).await,
            }
            self.timers.reap();
        }
        self.release().await;
        debug!("live session: handle dropped, actor stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Join { room_id, identity, reply } => self.handle_join(&room_id, &identity, reply).await,
            Command::Send { text, reply } => {
                let outcome = self.handle_send(&text);
                let _ = reply.send(outcome);
            }
            Command::Leave { reply } => {
                self.handle_leave().await;
                let _ = reply.send(());
            }
        }
    }

    async fn handle_event(&mut self, tagged: Tagged) {
        if tagged.generation != self.generation {
            if let Event::Settled { client, .. } = tagged.event {
                client.disconnect().await;
            }
            debug!(generation = tagged.generation, current = self.generation, "live session: stale event dropped");
            return;
        }

        match tagged.event {
            Event::Settled { client, result } => self.settle(client, result).await,
            Event::Message(payload) => self.receive(payload),
            Event::Roster(roster) => self.store.replace_roster(roster),
            Event::Welcome => self.welcome(),
            Event::SendFinished(result) => {
                self.sending = false;
                self.store.set_sending(false);
                if let Err(e) = result {
                    let err = SessionError::from(e);
                    warn!(error = %err, code = err.error_code(), "live session: send failed, local echo kept");
                }
            }
        }
    }

    // =========================================================================
    // JOIN / LEAVE
    // =========================================================================

    async fn handle_join(&mut self, room_id: &str, identity: &str, reply: JoinReply) {
        let (room_id, identity) = match validate_join(room_id, identity) {
            Ok(pair) => pair,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        let same_pair = self
            .binding
            .as_ref()
            .is_some_and(|b| b.room_id == room_id && b.identity == identity);
        if same_pair && self.connected {
            let _ = reply.send(Ok(JoinOutcome::AlreadyConnected));
            return;
        }
        if same_pair && self.connecting {
            // The latest intent is the pair already in flight.
            if let Some(queued) = self.queued.take() {
                let _ = queued.reply.send(Err(SessionError::Cancelled));
            }
            let _ = reply.send(Ok(JoinOutcome::AlreadyConnecting));
            return;
        }

        let already_queued = self
            .queued
            .as_ref()
            .is_some_and(|q| q.room_id == room_id && q.identity == identity);
        if already_queued {
            let _ = reply.send(Ok(JoinOutcome::AlreadyConnecting));
            return;
        }

        let request = JoinRequest { room_id, identity, reply };
        if self.connecting {
            info!(room_id = %request.room_id, identity = %request.identity, "live session: rebind queued behind in-flight connect");
            if let Some(previous) = self.queued.replace(request) {
                let _ = previous.reply.send(Err(SessionError::Cancelled));
            }
            return;
        }

        if self.binding.is_some() {
            self.release().await;
        }
        self.start(request);
    }

    fn start(&mut self, request: JoinRequest) {
        self.generation += 1;
        self.timers.cancel_all();
        let generation = self.generation;
        let JoinRequest { room_id, identity, reply } = request;
        info!(%room_id, %identity, generation, "live session: connecting");
        self.store.bind(&room_id, &identity);

        let client = self.factory.create();
        let tx = self.events.clone();
        client.on_message(Box::new(move |payload| {
            let _ = tx.send(Tagged { generation, event: Event::Message(payload) });
        }));
        let tx = self.events.clone();
        client.on_participants(Box::new(move |roster| {
            let _ = tx.send(Tagged { generation, event: Event::Roster(roster) });
        }));

        let provider = Arc::clone(&self.provider);
        let attempt_client = Arc::clone(&client);
        let url = self.room_url.clone();
        let room = room_id.clone();
        let ident = identity.clone();
        let tx = self.events.clone();
        self.attempt = Some(tokio::spawn(async move {
            let result = connect_once(provider.as_ref(), attempt_client.as_ref(), &url, &room, &ident).await;
            let _ = tx.send(Tagged { generation, event: Event::Settled { client: attempt_client, result } });
        }));

        self.pending = Some(client);
        self.binding = Some(Binding { room_id, identity });
        self.connecting = true;
        self.waiter = Some(reply);
    }

    async fn settle(&mut self, client: Arc<dyn RoomClient>, result: Result<(), SessionError>) {
        self.attempt = None;
        self.pending = None;
        self.connecting = false;

        match result {
            Ok(()) => {
                self.client = Some(client);
                if let Some(next) = self.queued.take() {
                    debug!("live session: connected attempt superseded by queued rebind");
                    self.release().await;
                    self.start(next);
                    return;
                }

                self.connected = true;
                self.store.set_phase(ConnectionPhase::Connected);
                if let Some(binding) = &self.binding {
                    info!(room_id = %binding.room_id, identity = %binding.identity, "live session: connected");
                }
                if let Some(waiter) = self.waiter.take() {
                    let _ = waiter.send(Ok(JoinOutcome::Connected));
                }
                if !self.welcomed {
                    self.timers
                        .after(WELCOME_DELAY, Tagged { generation: self.generation, event: Event::Welcome });
                }
            }
            Err(err) => {
                client.disconnect().await;
                warn!(error = %err, code = err.error_code(), "live session: connect failed");
                self.binding = None;
                self.store.disconnect();
                if let Some(waiter) = self.waiter.take() {
                    let _ = waiter.send(Err(err));
                }
                if let Some(next) = self.queued.take() {
                    self.start(next);
                }
            }
        }
    }

    async fn handle_leave(&mut self) {
        let had_binding = self.binding.is_some();
        self.release().await;
        if had_binding {
            self.store.disconnect();
            info!("live session: left room");
        }
    }

    /// Tear down the current binding: nothing from it may touch the state
    /// afterwards.
    async fn release(&mut self) {
        self.generation += 1;
        self.timers.cancel_all();
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        for client in [self.pending.take(), self.client.take()].into_iter().flatten() {
            client.disconnect().await;
        }
        self.binding = None;
        self.connecting = false;
        self.connected = false;
        self.sending = false;
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.send(Err(SessionError::Cancelled));
        }
        if let Some(queued) = self.queued.take() {
            let _ = queued.reply.send(Err(SessionError::Cancelled));
        }
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    fn receive(&mut self, payload: MessagePayload) {
        let Some(binding) = &self.binding else { return };
        // Own messages were already echoed locally.
        if payload.sender == binding.identity {
            debug!(sender = %payload.sender, "live session: self echo dropped");
            return;
        }
        let Some(text) = normalize_text(&payload.text) else { return };
        self.store.append(MessagePayload { text, ..payload });
    }

    fn welcome(&mut self) {
        if !self.connected || self.welcomed {
            return;
        }
        let Some(binding) = &self.binding else { return };
        self.welcomed = true;
        self.store.append(MessagePayload::assistant(welcome_text(&binding.identity)));
    }

    fn handle_send(&mut self, text: &str) -> SendOutcome {
        let (Some(client), Some(binding)) = (self.client.as_ref(), self.binding.as_ref()) else {
            return SendOutcome::NotConnected;
        };
        if !self.connected {
            return SendOutcome::NotConnected;
        }
        if self.sending {
            return SendOutcome::Busy;
        }
        let Some(text) = normalize_text(text) else {
            return SendOutcome::Empty;
        };

        let client = Arc::clone(client);
        let payload = MessagePayload::human(text, binding.identity.clone());
        self.sending = true;
        self.store.set_sending(true);
        self.store.append(payload.clone());

        let generation = self.generation;
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.send_message(&payload).await;
            let _ = tx.send(Tagged { generation, event: Event::SendFinished(result) });
        });
        SendOutcome::Sent
    }
}

async fn connect_once(
    provider: &dyn TokenProvider,
    client: &dyn RoomClient,
    url: &str,
    room_id: &str,
    identity: &str,
) -> Result<(), SessionError> {
    let token = provider.fetch_token(room_id, identity).await?;
    client.connect(url, &token).await?;
    Ok(())
}

#[cfg(test)]
#[path = "live_test.rs"]
mod tests;
