//! Watch-backed session state.
//!
//! The actor is the only writer. Every mutation goes through `send_modify`,
//! so subscribers always see a consistent [`SessionView`].

use tokio::sync::watch;

use crate::types::{ChatMessage, ConnectionPhase, MessagePayload, Participant, SessionView};

pub(crate) struct Store {
    tx: watch::Sender<SessionView>,
}

impl Store {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionView::default());
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.tx.subscribe()
    }

    pub(crate) fn participant_count(&self) -> usize {
        self.tx.borrow().participants.len()
    }

    /// Usernames currently on the roster, in roster order.
    pub(crate) fn participant_names(&self) -> Vec<String> {
        self.tx
            .borrow()
            .participants
            .iter()
            .map(|p| p.username.clone())
            .collect()
    }

    /// Point the view at a new (room, identity) pair.
    pub(crate) fn bind(&self, room_id: &str, identity: &str) {
        self.tx.send_modify(|view| {
            if view.room_id != room_id || view.current_user != identity {
                view.participants.clear();
            }
            view.room_id = room_id.to_owned();
            view.current_user = identity.to_owned();
            view.phase = ConnectionPhase::Connecting;
            view.is_connected = false;
            view.is_sending = false;
        });
    }

    pub(crate) fn set_phase(&self, phase: ConnectionPhase) {
        self.tx.send_modify(|view| {
            view.phase = phase;
            view.is_connected = phase == ConnectionPhase::Connected;
        });
    }

    pub(crate) fn set_sending(&self, sending: bool) {
        self.tx.send_if_modified(|view| {
            let changed = view.is_sending != sending;
            view.is_sending = sending;
            changed
        });
    }

    /// Stamp and append one message. History is append-only.
    pub(crate) fn append(&self, payload: MessagePayload) {
        let message = ChatMessage::from_payload(payload);
        self.tx.send_modify(|view| view.messages.push(message));
    }

    pub(crate) fn replace_roster(&self, roster: Vec<Participant>) {
        self.tx.send_modify(|view| view.participants = roster);
    }

    pub(crate) fn add_participant(&self, participant: Participant) {
        self.tx.send_modify(|view| view.participants.push(participant));
    }

    /// Remove the participant at `index`, returning it.
    pub(crate) fn remove_participant(&self, index: usize) -> Option<Participant> {
        let mut removed = None;
        self.tx.send_if_modified(|view| {
            if index < view.participants.len() {
                removed = Some(view.participants.remove(index));
                true
            } else {
                false
            }
        });
        removed
    }

    /// Post-leave shape: disconnected, empty roster, history kept.
    pub(crate) fn disconnect(&self) {
        self.tx.send_modify(|view| {
            view.phase = ConnectionPhase::Disconnected;
            view.is_connected = false;
            view.is_sending = false;
            view.participants.clear();
        });
    }
}
