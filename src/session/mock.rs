//! Mock session simulator — the live session's state shape without a server.
//!
//! DESIGN
//! ======
//! Joining "connects" after a fixed delay, posts a demo welcome and a second
//! scripted assistant message, then keeps the room lively: a couple of
//! participants arrive shortly after connecting and a periodic churn draw
//! adds or removes one. Every send gets a canned assistant reply and, now and
//! then, a reaction from a participant.
//!
//! All of it runs on generation-tagged timers, so `leave` silences every
//! scheduled message at once. Randomness comes from a [`RandomSource`] so
//! tests can script each draw.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::random::{RandomSource, RngSource};
use super::store::Store;
use super::timers::Timers;
use super::{ChatSession, Command, Handle, JoinOutcome, JoinReply, SendOutcome, SessionError, validate_join};
use crate::types::{ConnectionPhase, MessagePayload, Participant, SessionView, normalize_text};

/// Display names simulated participants are drawn from.
pub const NAME_POOL: [&str; 6] = ["Alice", "Bob", "Charlie", "Diana", "Eve", "Frank"];

pub const ASSISTANT_REPLIES: [&str; 10] = [
    "That's interesting! Tell me more about that.",
    "I understand. How does that make you feel?",
    "Thanks for sharing that with me. I'll remember this for our future conversations.",
    "That's a great point! I hadn't thought of it that way.",
    "I can help you with that. What would you like to know?",
    "Based on our previous conversations, I remember you mentioned something similar before.",
    "That reminds me of what we discussed earlier about your interests.",
    "I'm here to help! What questions do you have?",
    "That's fascinating! I love learning new things from our chats.",
    "I can see why that would be important to you.",
];

pub const PEER_REPLIES: [&str; 6] = [
    "I agree with that!",
    "That's really cool!",
    "Interesting perspective",
    "Thanks for sharing!",
    "I was thinking the same thing",
    "Good point!",
];

pub const JOIN_ANNOUNCEMENT: &str = "Hey everyone! Just joined the room.";
pub const GOODBYE_MESSAGE: &str = "Thanks for the chat, everyone! Gotta go.";
pub const INTRO_MESSAGE: &str = "This is a demo of the chat interface. The AI responses are simulated, \
     but the real version will have memory and a live model behind it.";

#[must_use]
pub fn welcome_text(identity: &str) -> String {
    format!(
        "Welcome to the room, {identity}! I'm your AI assistant. This is a demo mode - I can remember our \
         conversations and help you with various topics. Try sending me a message!"
    )
}

/// Delays, probabilities and limits of the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct MockTimings {
    pub connect_delay: Duration,
    /// After the welcome, before the second scripted message.
    pub intro_delay: Duration,
    pub churn_interval: Duration,
    /// Churn draws below this add a participant.
    pub join_probability: f64,
    /// Width of the band right above `join_probability` that removes one.
    pub leave_probability: f64,
    pub max_participants: usize,
    pub bootstrap_first: Duration,
    pub bootstrap_second: Duration,
    pub bootstrap_second_probability: f64,
    pub announce_min: Duration,
    pub announce_max: Duration,
    pub goodbye_delay: Duration,
    pub reply_min: Duration,
    pub reply_max: Duration,
    pub peer_reply_probability: f64,
    pub peer_reply_min: Duration,
    pub peer_reply_max: Duration,
    pub send_cooldown: Duration,
}

impl Default for MockTimings {
    fn default() -> Self {
        Self {
            connect_delay: Duration::from_millis(1500),
            intro_delay: Duration::from_secs(2),
            churn_interval: Duration::from_secs(10),
            join_probability: 0.10,
            leave_probability: 0.05,
            max_participants: 4,
            bootstrap_first: Duration::from_secs(3),
            bootstrap_second: Duration::from_secs(5),
            bootstrap_second_probability: 0.5,
            announce_min: Duration::from_secs(1),
            announce_max: Duration::from_secs(4),
            goodbye_delay: Duration::from_millis(500),
            reply_min: Duration::from_secs(1),
            reply_max: Duration::from_secs(3),
            peer_reply_probability: 0.3,
            peer_reply_min: Duration::from_secs(2),
            peer_reply_max: Duration::from_secs(5),
            send_cooldown: Duration::from_secs(1),
        }
    }
}

/// Session manager that simulates a room.
pub struct MockSession {
    handle: Handle,
}

impl MockSession {
    /// Spawn the simulator task. Must be called within a Tokio runtime.
    #[must_use]
    pub fn spawn(timings: MockTimings, random: Box<dyn RandomSource>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let store = Store::new();
        let view = store.subscribe();

        let actor = Actor {
            timings,
            random,
            store,
            timers: Timers::new(events_tx),
            generation: 0,
            binding: None,
            connecting: false,
            connected: false,
            sending: false,
            waiter: None,
        };
        tokio::spawn(actor.run(cmd_rx, events_rx));

        Self { handle: Handle::new(cmd_tx, view) }
    }

    /// Default timings with OS-seeded randomness.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::spawn(MockTimings::default(), Box::new(RngSource::from_os()))
    }

    /// Default timings with a fixed seed, for reproducible demos.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::spawn(MockTimings::default(), Box::new(RngSource::seeded(seed)))
    }
}

#[async_trait::async_trait]
impl ChatSession for MockSession {
    async fn join(&self, room_id: &str, identity: &str) -> Result<JoinOutcome, SessionError> {
        self.handle.join(room_id, identity).await
    }

    async fn send(&self, text: &str) -> Result<SendOutcome, SessionError> {
        self.handle.send(text).await
    }

    async fn leave(&self) -> Result<(), SessionError> {
        self.handle.leave().await
    }

    fn subscribe(&self) -> watch::Receiver<SessionView> {
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
    Connected,
    Bootstrap,
    Churn,
    /// Post a scheduled message.
    Say(MessagePayload),
    SendCooldown,
}

struct Binding {
    room_id: String,
    identity: String,
}

struct Actor {
    timings: MockTimings,
    random: Box<dyn RandomSource>,
    store: Store,
    timers: Timers<Tagged>,
    generation: u64,
    binding: Option<Binding>,
    connecting: bool,
    connected: bool,
    sending: bool,
    waiter: Option<JoinReply>,
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, mut events: mpsc::UnboundedReceiver<Tagged>) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command);
                }
                Some(tagged) = events.recv() => self.handle_event(tagged),
            }
            self.timers.reap();
        }
        self.release();
        debug!("mock session: handle dropped, actor stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Join { room_id, identity, reply } => self.handle_join(&room_id, &identity, reply),
            Command::Send { text, reply } => {
                let outcome = self.handle_send(&text);
                let _ = reply.send(outcome);
            }
            Command::Leave { reply } => {
                if self.binding.is_some() {
                    self.release();
                    self.store.disconnect();
                    info!("mock session: left room");
                }
                let _ = reply.send(());
            }
        }
    }

    fn handle_event(&mut self, tagged: Tagged) {
        if tagged.generation != self.generation {
            return;
        }
        match tagged.event {
            Event::Connected => self.on_connected(),
            Event::Bootstrap => self.add_random_participant(),
            Event::Churn => self.churn(),
            Event::Say(payload) => self.store.append(payload),
            Event::SendCooldown => {
                self.sending = false;
                self.store.set_sending(false);
            }
        }
    }

    fn schedule(&mut self, delay: Duration, event: Event) {
        self.timers.after(delay, Tagged { generation: self.generation, event });
    }

    // =========================================================================
    // CONNECT
    // =========================================================================

    fn handle_join(&mut self, room_id: &str, identity: &str, reply: JoinReply) {
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
            let _ = reply.send(Ok(JoinOutcome::AlreadyConnecting));
            return;
        }

        // Nothing real to tear down, so a rebind simply replaces the binding.
        self.release();
        info!(%room_id, %identity, "mock session: connecting");
        self.store.bind(&room_id, &identity);
        self.binding = Some(Binding { room_id, identity });
        self.connecting = true;
        self.waiter = Some(reply);
        self.schedule(self.timings.connect_delay, Event::Connected);
    }

    fn on_connected(&mut self) {
        let Some(identity) = self.binding.as_ref().map(|b| b.identity.clone()) else {
            return;
        };
        self.connecting = false;
        self.connected = true;
        self.store.set_phase(ConnectionPhase::Connected);
        self.store.append(MessagePayload::assistant(welcome_text(&identity)));
        self.schedule(self.timings.intro_delay, Event::Say(MessagePayload::assistant(INTRO_MESSAGE)));

        let generation = self.generation;
        self.timers
            .every(self.timings.churn_interval, move || Tagged { generation, event: Event::Churn });

        if self.store.participant_count() == 0 {
            self.schedule(self.timings.bootstrap_first, Event::Bootstrap);
            if self.random.next_f64() < self.timings.bootstrap_second_probability {
                self.schedule(self.timings.bootstrap_second, Event::Bootstrap);
            }
        }

        info!(%identity, "mock session: connected");
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.send(Ok(JoinOutcome::Connected));
        }
    }

    fn release(&mut self) {
        if self.timers.pending() > 0 {
            debug!(pending = self.timers.pending(), "mock session: cancelling timers");
        }
        self.generation += 1;
        self.timers.cancel_all();
        self.binding = None;
        self.connecting = false;
        self.connected = false;
        self.sending = false;
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.send(Err(SessionError::Cancelled));
        }
    }

    // =========================================================================
    // CHURN
    // =========================================================================

    fn churn(&mut self) {
        let draw = self.random.next_f64();
        let count = self.store.participant_count();
        let join_p = self.timings.join_probability;
        if draw < join_p {
            if count < self.timings.max_participants {
                self.add_random_participant();
            }
        } else if draw < join_p + self.timings.leave_probability && count > 0 {
            self.remove_random_participant();
        }
    }

    /// Add a pool name that is neither present nor the current user.
    fn add_random_participant(&mut self) {
        let Some(identity) = self.binding.as_ref().map(|b| b.identity.clone()) else {
            return;
        };
        if self.store.participant_count() >= self.timings.max_participants {
            return;
        }
        let present = self.store.participant_names();
        let available: Vec<&str> = NAME_POOL
            .iter()
            .copied()
            .filter(|name| *name != identity && !present.iter().any(|p| p == name))
            .collect();
        if available.is_empty() {
            return;
        }

        let name = available[self.random.pick_index(available.len())];
        self.store.add_participant(Participant::new(name));
        debug!(%name, "mock session: participant joined");

        let delay = self
            .random
            .duration_between(self.timings.announce_min, self.timings.announce_max);
        self.schedule(delay, Event::Say(MessagePayload::human(JOIN_ANNOUNCEMENT, name)));
    }

    fn remove_random_participant(&mut self) {
        let count = self.store.participant_count();
        if count == 0 {
            return;
        }
        let index = self.random.pick_index(count);
        let Some(leaving) = self.store.remove_participant(index) else {
            return;
        };
        debug!(name = %leaving.username, "mock session: participant left");
        self.schedule(self.timings.goodbye_delay, Event::Say(MessagePayload::human(GOODBYE_MESSAGE, leaving.username)));
    }

    // =========================================================================
    // SEND
    // =========================================================================

    fn handle_send(&mut self, text: &str) -> SendOutcome {
        let Some(identity) = self.binding.as_ref().map(|b| b.identity.clone()) else {
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

        self.sending = true;
        self.store.set_sending(true);
        self.store.append(MessagePayload::human(text, identity));

        let delay = self.random.duration_between(self.timings.reply_min, self.timings.reply_max);
        let reply = ASSISTANT_REPLIES[self.random.pick_index(ASSISTANT_REPLIES.len())];
        self.schedule(delay, Event::Say(MessagePayload::assistant(reply)));

        let roster = self.store.participant_names();
        if !roster.is_empty() && self.random.next_f64() < self.timings.peer_reply_probability {
            let peer = roster[self.random.pick_index(roster.len())].clone();
            let delay = self
                .random
                .duration_between(self.timings.peer_reply_min, self.timings.peer_reply_max);
            let text = PEER_REPLIES[self.random.pick_index(PEER_REPLIES.len())];
            self.schedule(delay, Event::Say(MessagePayload::human(text, peer)));
        }

        self.schedule(self.timings.send_cooldown, Event::SendCooldown);
        SendOutcome::Sent
    }
}

#[cfg(test)]
#[path = "mock_test.rs"]
mod tests;
