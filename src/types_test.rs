use super::*;

// =============================================================================
// normalize_text
// =============================================================================

#[test]
fn normalize_text_trims_whitespace() {
    assert_eq!(normalize_text("  hello \n"), Some("hello".to_owned()));
}

#[test]
fn normalize_text_rejects_blank() {
    assert_eq!(normalize_text(""), None);
    assert_eq!(normalize_text("   \t\n"), None);
}

#[test]
fn normalize_text_clips_to_max_len() {
    let long = "a".repeat(MAX_MESSAGE_LEN + 40);
    let clipped = normalize_text(&long).unwrap();
    assert_eq!(clipped.chars().count(), MAX_MESSAGE_LEN);
}

#[test]
fn normalize_text_clips_on_char_boundary() {
    let long = "é".repeat(MAX_MESSAGE_LEN + 1);
    let clipped = normalize_text(&long).unwrap();
    assert_eq!(clipped.chars().count(), MAX_MESSAGE_LEN);
    assert!(clipped.chars().all(|c| c == 'é'));
}

#[test]
fn normalize_text_keeps_exact_limit() {
    let exact = "b".repeat(MAX_MESSAGE_LEN);
    assert_eq!(normalize_text(&exact), Some(exact));
}

// =============================================================================
// MessagePayload wire shape
// =============================================================================

#[test]
fn payload_serializes_with_is_ai_key() {
    let payload = MessagePayload::human("hi", "alice");
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json, serde_json::json!({"text": "hi", "sender": "alice", "isAI": false}));
}

#[test]
fn payload_missing_is_ai_defaults_to_human() {
    let payload: MessagePayload = serde_json::from_str(r#"{"text":"yo","sender":"bob"}"#).unwrap();
    assert!(!payload.is_ai);
    assert_eq!(payload.sender, "bob");
}

#[test]
fn assistant_payload_uses_assistant_name() {
    let payload = MessagePayload::assistant("welcome");
    assert!(payload.is_ai);
    assert_eq!(payload.sender, ASSISTANT_NAME);
}

// =============================================================================
// ChatMessage / Participant
// =============================================================================

#[test]
fn chat_message_from_payload_assigns_unique_ids() {
    let a = ChatMessage::from_payload(MessagePayload::human("x", "alice"));
    let b = ChatMessage::from_payload(MessagePayload::human("x", "alice"));
    assert_ne!(a.id, b.id);
    assert_eq!(a.text, "x");
    assert!(!a.is_ai);
}

#[test]
fn chat_message_serializes_timestamp_as_rfc3339() {
    let msg = ChatMessage::from_payload(MessagePayload::assistant("hello"));
    let json = serde_json::to_value(&msg).unwrap();
    let ts = json.get("timestamp").and_then(|v| v.as_str()).unwrap();
    assert!(ts.contains('T'));
    assert_eq!(json.get("isAI"), Some(&serde_json::json!(true)));
}

#[test]
fn participant_new_is_connected() {
    let p = Participant::new("Diana");
    assert!(p.is_connected);
    assert_eq!(p.username, "Diana");
    let json = serde_json::to_value(&p).unwrap();
    assert!(json.get("joinedAt").is_some());
    assert_eq!(json.get("isConnected"), Some(&serde_json::json!(true)));
}

// =============================================================================
// SessionView
// =============================================================================

#[test]
fn session_view_default_is_idle_and_empty() {
    let view = SessionView::default();
    assert_eq!(view.phase, ConnectionPhase::Idle);
    assert!(view.messages.is_empty());
    assert!(!view.is_connected);
    assert!(!view.is_sending);
}

#[test]
fn session_view_helpers() {
    let mut view = SessionView::default();
    view.messages.push(ChatMessage::from_payload(MessagePayload::human("a", "alice")));
    view.messages.push(ChatMessage::from_payload(MessagePayload::assistant("b")));
    view.participants.push(Participant::new("Bob"));
    assert_eq!(view.assistant_messages().count(), 1);
    assert!(view.has_participant("Bob"));
    assert!(!view.has_participant("bob"));
}
