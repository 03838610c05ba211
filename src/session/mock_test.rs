use super::*;
use crate::session::ScriptedSource;
use tokio::time::{Instant, sleep, sleep_until, timeout};

/// Every draw returns `value`.
fn constant(value: f64) -> Box<dyn RandomSource> {
    Box::new(ScriptedSource::new(std::iter::empty(), value))
}

fn mock(value: f64) -> MockSession {
    MockSession::spawn(MockTimings::default(), constant(value))
}

async fn wait_until(session: &MockSession, pred: impl FnMut(&SessionView) -> bool) {
    let mut rx = session.subscribe();
    timeout(Duration::from_secs(300), rx.wait_for(pred))
        .await
        .expect("condition not reached")
        .map(|_| ())
        .expect("session closed");
}

fn count_text(view: &SessionView, text: &str) -> usize {
    view.messages.iter().filter(|m| m.text == text).count()
}

// =============================================================================
// CONNECT
// =============================================================================

#[tokio::test(start_paused = true)]
async fn join_scripts_welcome_then_intro() {
    let s = mock(0.9);
    let start = Instant::now();

    assert_eq!(s.join("lobby", "alice").await, Ok(JoinOutcome::Connected));
    assert!(start.elapsed() >= Duration::from_millis(1500));
    let view = s.view();
    assert!(view.is_connected);
    assert_eq!(view.phase, ConnectionPhase::Connected);
    assert_eq!(view.messages.len(), 1);
    assert!(view.messages[0].is_ai);
    assert!(view.messages[0].text.contains("alice"));

    sleep_until(start + Duration::from_secs(4)).await;
    let view = s.view();
    assert_eq!(view.messages.len(), 2);
    assert_eq!(view.messages[1].text, INTRO_MESSAGE);
    assert_eq!(view.messages[1].sender, crate::types::ASSISTANT_NAME);
}

#[tokio::test(start_paused = true)]
async fn concurrent_joins_connect_once() {
    let s = mock(0.9);
    let (a, b) = tokio::join!(s.join("lobby", "alice"), s.join("lobby", "alice"));
    let mut outcomes = [a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| *o == JoinOutcome::Connected);
    assert_eq!(outcomes, [JoinOutcome::AlreadyConnecting, JoinOutcome::Connected]);
    assert_eq!(s.join("lobby", "alice").await, Ok(JoinOutcome::AlreadyConnected));
    assert_eq!(count_text(&s.view(), &welcome_text("alice")), 1);
}

#[tokio::test(start_paused = true)]
async fn rebind_while_connecting_cancels_previous_join() {
    let s = std::sync::Arc::new(mock(0.9));
    let first = tokio::spawn({
        let s = std::sync::Arc::clone(&s);
        async move { s.join("lobby", "alice").await }
    });
    sleep(Duration::from_millis(10)).await;

    assert_eq!(s.join("lobby", "bob").await, Ok(JoinOutcome::Connected));
    assert_eq!(first.await.unwrap(), Err(SessionError::Cancelled));

    let view = s.view();
    assert_eq!(view.current_user, "bob");
    assert_eq!(view.assistant_messages().count(), 1);
    assert_eq!(count_text(&view, &welcome_text("bob")), 1);
}

#[tokio::test(start_paused = true)]
async fn seeded_session_joins_and_connects() {
    let s = MockSession::seeded(7);
    assert_eq!(s.join("lobby", "alice").await, Ok(JoinOutcome::Connected));

    let view = s.view();
    assert!(view.is_connected);
    assert_eq!(view.current_user, "alice");
    assert_eq!(count_text(&view, &welcome_text("alice")), 1);
}

#[tokio::test(start_paused = true)]
async fn default_session_joins_and_connects() {
    let s = MockSession::with_defaults();
    assert_eq!(s.join("lobby", "bob").await, Ok(JoinOutcome::Connected));
    assert_eq!(s.view().phase, ConnectionPhase::Connected);
}

#[tokio::test(start_paused = true)]
async fn invalid_join_is_rejected() {
    let s = mock(0.9);
    assert_eq!(s.join("lobby", " ").await, Err(SessionError::InvalidJoin));
    assert_eq!(s.view(), SessionView::default());
}

// =============================================================================
// SEND
// =============================================================================

#[tokio::test(start_paused = true)]
async fn send_echoes_and_assistant_replies_within_window() {
    let s = mock(0.9);
    s.join("lobby", "alice").await.unwrap();

    let sent_at = Instant::now();
    assert_eq!(s.send("hello").await, Ok(SendOutcome::Sent));
    let echo = s.view().messages.last().cloned().unwrap();
    assert_eq!((echo.text.as_str(), echo.sender.as_str(), echo.is_ai), ("hello", "alice", false));

    wait_until(&s, |v| v.messages.iter().any(|m| ASSISTANT_REPLIES.contains(&m.text.as_str()))).await;
    let waited = sent_at.elapsed();
    assert!(waited >= Duration::from_secs(1) && waited <= Duration::from_secs(3), "{waited:?}");

    let view = s.view();
    let replies: Vec<_> = view
        .messages
        .iter()
        .filter(|m| ASSISTANT_REPLIES.contains(&m.text.as_str()))
        .collect();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].is_ai);
}

#[tokio::test(start_paused = true)]
async fn send_guard_blocks_until_cooldown() {
    let s = mock(0.9);
    assert_eq!(s.send("early").await, Ok(SendOutcome::NotConnected));
    s.join("lobby", "alice").await.unwrap();

    assert_eq!(s.send("one").await, Ok(SendOutcome::Sent));
    assert!(s.view().is_sending);
    assert_eq!(s.send("two").await, Ok(SendOutcome::Busy));

    sleep(Duration::from_millis(1100)).await;
    assert!(!s.view().is_sending);
    assert_eq!(s.send("   ").await, Ok(SendOutcome::Empty));
    assert_eq!(s.send("three").await, Ok(SendOutcome::Sent));

    let view = s.view();
    assert_eq!(count_text(&view, "one"), 1);
    assert_eq!(count_text(&view, "two"), 0);
    assert_eq!(count_text(&view, "three"), 1);
}

#[tokio::test(start_paused = true)]
async fn participant_reacts_to_send_when_drawn() {
    // 0.1: both bootstrap joins happen and the peer reply draw hits.
    let s = mock(0.1);
    s.join("lobby", "zed").await.unwrap();
    wait_until(&s, |v| v.participants.len() == 2).await;

    s.send("what's up").await.unwrap();
    wait_until(&s, |v| v.messages.iter().any(|m| m.text == PEER_REPLIES[0])).await;

    let view = s.view();
    let reaction = view.messages.iter().find(|m| m.text == PEER_REPLIES[0]).unwrap();
    assert!(!reaction.is_ai);
    assert_eq!(reaction.sender, "Alice");
}

// =============================================================================
// CHURN
// =============================================================================

#[tokio::test(start_paused = true)]
async fn churn_caps_roster_without_duplicates() {
    // 0.05 always lands in the join band.
    let s = mock(0.05);
    s.join("lobby", "Alice").await.unwrap();

    sleep(Duration::from_secs(120)).await;
    let view = s.view();
    let names: Vec<&str> = view.participants.iter().map(|p| p.username.as_str()).collect();
    assert_eq!(names, ["Bob", "Charlie", "Diana", "Eve"]);
    assert!(!view.has_participant("Alice"));
    assert_eq!(count_text(&view, JOIN_ANNOUNCEMENT), 4);
}

#[tokio::test(start_paused = true)]
async fn churn_removes_with_goodbye() {
    // 0.12 lands in the leave band.
    let s = mock(0.12);
    s.join("lobby", "carol").await.unwrap();
    wait_until(&s, |v| v.participants.len() == 2).await;

    wait_until(&s, |v| v.participants.is_empty() && count_text(v, GOODBYE_MESSAGE) == 2).await;
    let view = s.view();
    let mut leavers: Vec<&str> = view
        .messages
        .iter()
        .filter(|m| m.text == GOODBYE_MESSAGE)
        .map(|m| m.sender.as_str())
        .collect();
    leavers.sort_unstable();
    assert_eq!(leavers, ["Alice", "Bob"]);
}

#[tokio::test(start_paused = true)]
async fn quiet_draws_leave_roster_alone() {
    let s = mock(0.9);
    s.join("lobby", "alice").await.unwrap();
    wait_until(&s, |v| v.participants.len() == 1).await;
    sleep(Duration::from_secs(60)).await;
    assert_eq!(s.view().participants.len(), 1);
}

// =============================================================================
// LEAVE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn leave_clears_roster_keeps_history() {
    let s = mock(0.9);
    s.join("lobby", "alice").await.unwrap();
    wait_until(&s, |v| count_text(v, JOIN_ANNOUNCEMENT) == 1).await;

    s.leave().await.unwrap();
    let view = s.view();
    assert!(!view.is_connected);
    assert_eq!(view.phase, ConnectionPhase::Disconnected);
    assert!(view.participants.is_empty());
    assert_eq!(view.messages.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn leave_cancels_pending_replies() {
    let s = mock(0.5);
    s.join("lobby", "alice").await.unwrap();
    s.send("hello").await.unwrap();
    s.leave().await.unwrap();

    let view = s.view();
    assert!(!view.is_sending);
    assert_eq!(view.messages.len(), 2);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(s.view(), view);
    assert_eq!(s.send("still there?").await, Ok(SendOutcome::NotConnected));
}

#[tokio::test(start_paused = true)]
async fn leave_without_join_is_noop() {
    let s = mock(0.5);
    s.leave().await.unwrap();
    assert_eq!(s.view(), SessionView::default());
}
