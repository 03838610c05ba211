use super::*;
use crate::state::test_helpers;

fn local_configured() -> LocalTokenProvider {
    LocalTokenProvider::from_config(Some(&test_helpers::test_room_config()))
}

// =============================================================================
// LOCAL
// =============================================================================

#[tokio::test]
async fn local_without_issuer_is_misconfigured() {
    let provider = LocalTokenProvider::from_config(None);
    assert_eq!(provider.fetch_token("lobby", "alice").await, Err(ProviderError::Misconfigured));
}

#[tokio::test]
async fn local_issues_verifiable_token() {
    let token = local_configured().fetch_token("lobby", "alice").await.unwrap();
    let issuer = TokenIssuer::new(test_helpers::TEST_API_KEY, test_helpers::TEST_API_SECRET);
    let claims = issuer.verify(&token).unwrap();
    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.video.room, "lobby");
}

#[tokio::test]
async fn local_propagates_issue_errors() {
    let err = local_configured().fetch_token("", "alice").await.unwrap_err();
    assert!(matches!(err, ProviderError::Issue(_)));
}

// =============================================================================
// HTTP
// =============================================================================

fn endpoint_for(base: &str) -> String {
    format!("http://{base}/api/token")
}

#[tokio::test]
async fn http_fetches_token_from_endpoint() {
    let base = test_helpers::spawn_server(test_helpers::test_app_state()).await;
    let provider = HttpTokenProvider::new(endpoint_for(&base));
    let token = provider.fetch_token("lobby", "alice").await.unwrap();

    let issuer = TokenIssuer::new(test_helpers::TEST_API_KEY, test_helpers::TEST_API_SECRET);
    assert_eq!(issuer.verify(&token).unwrap().sub, "alice");
}

#[tokio::test]
async fn http_maps_misconfigured_server() {
    let base = test_helpers::spawn_server(test_helpers::unconfigured_app_state()).await;
    let provider = HttpTokenProvider::new(endpoint_for(&base));
    assert_eq!(provider.fetch_token("lobby", "alice").await, Err(ProviderError::Misconfigured));
}

#[tokio::test]
async fn http_reports_bad_request_status() {
    let base = test_helpers::spawn_server(test_helpers::test_app_state()).await;
    let provider = HttpTokenProvider::new(endpoint_for(&base));
    let err = provider.fetch_token("", "alice").await.unwrap_err();
    match err {
        ProviderError::Status { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("Missing roomName or username"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn http_unreachable_endpoint() {
    // Reserve a port, then free it so nothing is listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let provider = HttpTokenProvider::new(endpoint_for(&addr.to_string()));
    let err = provider.fetch_token("lobby", "alice").await.unwrap_err();
    assert!(matches!(err, ProviderError::Unreachable(_)));
    assert!(err.retryable());
}

#[test]
fn from_config_uses_token_endpoint() {
    let config = ClientConfig { token_endpoint: "http://example.test/api/token".into(), ..ClientConfig::default() };
    assert_eq!(HttpTokenProvider::from_config(&config).endpoint(), "http://example.test/api/token");
}

// =============================================================================
// ERROR CODES
// =============================================================================

#[test]
fn error_codes_and_retryability() {
    assert_eq!(ProviderError::Misconfigured.error_code(), "E_CONFIGURATION");
    assert!(!ProviderError::Misconfigured.retryable());
    assert!(ProviderError::Status { status: 503, body: String::new() }.retryable());
    assert!(!ProviderError::Status { status: 400, body: String::new() }.retryable());
    assert!(!ProviderError::MissingToken.retryable());
}

#[test]
fn token_response_omits_absent_fields() {
    let json = serde_json::to_value(TokenResponse { error: Some("x".into()), ..TokenResponse::default() }).unwrap();
    assert_eq!(json, serde_json::json!({ "error": "x" }));
}
