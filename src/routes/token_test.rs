use super::*;
use crate::state::test_helpers;
use crate::token::TokenIssuer;

fn request(room: Option<&str>, username: Option<&str>) -> TokenRequest {
    TokenRequest { room_name: room.map(str::to_owned), username: username.map(str::to_owned) }
}

#[test]
fn issues_verifiable_token_with_ws_url() {
    let state = test_helpers::test_app_state();
    let (status, body) = build_token_response(&state, &request(Some("lobby"), Some("alice")));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.ws_url.as_deref(), Some(test_helpers::TEST_WS_URL));
    assert!(body.error.is_none());

    let issuer = TokenIssuer::new(test_helpers::TEST_API_KEY, test_helpers::TEST_API_SECRET);
    let claims = issuer.verify(body.token.as_deref().unwrap()).unwrap();
    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.video.room, "lobby");
}

#[test]
fn trims_room_and_username() {
    let state = test_helpers::test_app_state();
    let (status, body) = build_token_response(&state, &request(Some(" lobby "), Some(" alice ")));
    assert_eq!(status, StatusCode::OK);
    let claims = state.issuer.as_ref().unwrap().verify(&body.token.unwrap()).unwrap();
    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.video.room, "lobby");
}

#[test]
fn missing_room_is_bad_request() {
    let state = test_helpers::test_app_state();
    let (status, body) = build_token_response(&state, &request(None, Some("alice")));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.error.as_deref(), Some(MISSING_FIELDS_MESSAGE));
    assert!(body.token.is_none());
}

#[test]
fn blank_username_is_bad_request() {
    let state = test_helpers::test_app_state();
    let (status, _) = build_token_response(&state, &request(Some("lobby"), Some("  ")));
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[test]
fn assistant_name_is_reserved() {
    let state = test_helpers::test_app_state();
    let (status, body) = build_token_response(&state, &request(Some("lobby"), Some(crate::types::ASSISTANT_NAME)));
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body.error.as_deref(), Some(RESERVED_NAME_MESSAGE));
    assert!(body.token.is_none());
}

#[test]
fn overflowing_ttl_is_a_server_error_not_a_panic() {
    let mut config = test_helpers::test_room_config();
    config.token_ttl_secs = i64::MAX;
    let state = crate::state::AppState::new(Some(config));
    let (status, body) = build_token_response(&state, &request(Some("lobby"), Some("alice")));
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.error.as_deref(), Some(ISSUE_FAILED_MESSAGE));
}

#[test]
fn unconfigured_server_refuses_every_request() {
    let state = test_helpers::unconfigured_app_state();
    for (room, user) in [("lobby", "alice"), ("other", "bob")] {
        let (status, body) = build_token_response(&state, &request(Some(room), Some(user)));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.as_deref(), Some(MISCONFIGURED_MESSAGE));
        assert!(body.token.is_none());
    }
}

#[test]
fn validation_runs_before_config_check() {
    let state = test_helpers::unconfigured_app_state();
    let (status, _) = build_token_response(&state, &request(None, None));
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn handler_serializes_camel_case_body() {
    let state = test_helpers::test_app_state();
    let resp = issue_token(State(state), Json(request(Some("lobby"), Some("alice")))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(json.get("token").is_some());
    assert_eq!(json["wsUrl"], test_helpers::TEST_WS_URL);
    assert!(json.get("error").is_none());
}
