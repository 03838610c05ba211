//! Room service — join/part, roster snapshots and data fan-out.
//!
//! DESIGN
//! ======
//! Rooms are created on first join and evicted when the last member parts.
//! Every membership change pushes a roster frame to each member; the roster
//! a member receives lists the *other* members only, matching what a room
//! client reports as its remote participants. The assistant is a member
//! for data fan-out but never appears in a roster.

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::state::{AppState, RoomMember};
use crate::transport::wire::RelayFrame;
use crate::types::{ASSISTANT_NAME, MessagePayload, Participant};

/// Add a member to a room (creating it if needed) and push fresh rosters.
pub async fn join_room(
    state: &AppState,
    room_id: &str,
    client_id: Uuid,
    participant: Participant,
    tx: mpsc::Sender<RelayFrame>,
) {
    {
        let mut rooms = state.rooms.write().await;
        let room = rooms.entry(room_id.to_owned()).or_default();
        room.members.insert(client_id, RoomMember { participant, tx });
        info!(%room_id, %client_id, members = room.members.len(), "client joined room");
    }
    broadcast_roster(state, room_id).await;
}

/// Remove a member; evict the room when empty, otherwise push fresh rosters.
pub async fn part_room(state: &AppState, room_id: &str, client_id: Uuid) {
    {
        let mut rooms = state.rooms.write().await;
        let Some(room) = rooms.get_mut(room_id) else {
            return;
        };
        room.members.remove(&client_id);
        info!(%room_id, %client_id, remaining = room.members.len(), "client left room");

        if room.members.is_empty() {
            rooms.remove(room_id);
            info!(%room_id, "evicted empty room");
            return;
        }
    }
    broadcast_roster(state, room_id).await;
}

/// Snapshot of everyone in a room except `exclude`.
pub async fn list_participants(state: &AppState, room_id: &str, exclude: Option<Uuid>) -> Vec<Participant> {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(room_id) else {
        return Vec::new();
    };
    let mut participants: Vec<Participant> = room
        .members
        .iter()
        .filter(|(id, m)| exclude != Some(**id) && is_listed(m))
        .map(|(_, m)| m.participant.clone())
        .collect();
    sort_roster(&mut participants);
    participants
}

/// Push each member the roster of everyone else in the room.
pub async fn broadcast_roster(state: &AppState, room_id: &str) {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(room_id) else {
        return;
    };

    for (client_id, member) in &room.members {
        let mut participants: Vec<Participant> = room
            .members
            .iter()
            .filter(|(id, m)| *id != client_id && is_listed(m))
            .map(|(_, m)| m.participant.clone())
            .collect();
        sort_roster(&mut participants);
        // Best-effort: if a member's channel is full, skip it.
        let _ = member.tx.try_send(RelayFrame::Roster { participants });
    }
}

/// Fan a data payload out to every member except the publisher.
pub async fn broadcast_data(state: &AppState, room_id: &str, payload: &MessagePayload, exclude: Option<Uuid>) {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(room_id) else {
        return;
    };

    for (client_id, member) in &room.members {
        if exclude == Some(*client_id) {
            continue;
        }
        let _ = member.tx.try_send(RelayFrame::Data { payload: payload.clone() });
    }
}

fn is_listed(member: &RoomMember) -> bool {
    member.participant.username != ASSISTANT_NAME
}

/// Oldest member first; ties broken by name so snapshots are stable.
fn sort_roster(participants: &mut [Participant]) {
    participants.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.username.cmp(&b.username)));
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
