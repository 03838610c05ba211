//! Token providers — where a session gets its room credential.
//!
//! DESIGN
//! ======
//! [`TokenProvider`] maps (room, identity) to a short-lived token. Two
//! implementations:
//! - [`HttpTokenProvider`] posts to the token endpoint (`/api/token`), the
//!   way a browser client would.
//! - [`LocalTokenProvider`] signs in-process with an optional issuer; without
//!   one it refuses every request as misconfigured, same as the endpoint.

use serde::{Deserialize, Serialize};

use crate::config::{ClientConfig, RoomServerConfig};
use crate::error::ErrorCode;
use crate::token::{TokenError, TokenIssuer};

/// Body error string the token endpoint returns when signing config is absent.
pub const MISCONFIGURED_MESSAGE: &str = "Server misconfigured";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("server misconfigured: token signing is not available")]
    Misconfigured,
    #[error("token endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("token endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed token response: {0}")]
    Malformed(String),
    #[error("no token received from server")]
    MissingToken,
    #[error("token issue failed: {0}")]
    Issue(#[from] TokenError),
}

impl ErrorCode for ProviderError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Misconfigured => "E_CONFIGURATION",
            Self::Unreachable(_) => "E_TOKEN_UNREACHABLE",
            Self::Status { .. } => "E_TOKEN_STATUS",
            Self::Malformed(_) => "E_TOKEN_MALFORMED_RESPONSE",
            Self::MissingToken => "E_TOKEN_MISSING",
            Self::Issue(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Status { status: 500..=599, .. })
    }
}

#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self, room_id: &str, identity: &str) -> Result<String, ProviderError>;
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// `POST /api/token` request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub room_name: Option<String>,
    pub username: Option<String>,
}

/// `POST /api/token` response body. Success carries `token` + `wsUrl`,
/// failure carries `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// LOCAL
// =============================================================================

/// Signs tokens in-process.
pub struct LocalTokenProvider {
    issuer: Option<TokenIssuer>,
}

impl LocalTokenProvider {
    #[must_use]
    pub fn new(issuer: Option<TokenIssuer>) -> Self {
        Self { issuer }
    }

    #[must_use]
    pub fn from_config(config: Option<&RoomServerConfig>) -> Self {
        Self::new(config.map(TokenIssuer::from_config))
    }
}

#[async_trait::async_trait]
impl TokenProvider for LocalTokenProvider {
    async fn fetch_token(&self, room_id: &str, identity: &str) -> Result<String, ProviderError> {
        let Some(issuer) = &self.issuer else {
            return Err(ProviderError::Misconfigured);
        };
        Ok(issuer.issue(room_id, identity)?)
    }
}

// =============================================================================
// HTTP
// =============================================================================

/// Fetches tokens from a remote token endpoint.
pub struct HttpTokenProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTokenProvider {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into() }
    }

    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.token_endpoint)
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch_token(&self, room_id: &str, identity: &str) -> Result<String, ProviderError> {
        let body = TokenRequest { room_name: Some(room_id.to_owned()), username: Some(identity.to_owned()) };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unreachable(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ProviderError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            let error = serde_json::from_str::<TokenResponse>(&text)
                .ok()
                .and_then(|r| r.error);
            if error.as_deref() == Some(MISCONFIGURED_MESSAGE) {
                return Err(ProviderError::Misconfigured);
            }
            return Err(ProviderError::Status { status: status.as_u16(), body: text });
        }

        let parsed: TokenResponse = serde_json::from_str(&text).map_err(|e| ProviderError::Malformed(e.to_string()))?;
        parsed
            .token
            .filter(|t| !t.is_empty())
            .ok_or(ProviderError::MissingToken)
    }
}

#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;
