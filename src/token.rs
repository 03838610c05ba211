//! Room access tokens — HS256 JWTs carrying a single-room grant.
//!
//! DESIGN
//! ======
//! A token is `base64url(header).base64url(claims).base64url(hmac)`, signed
//! with the server's API secret. Claims name the issuing API key (`iss`), the
//! identity (`sub`), a validity window (`nbf`/`exp`) and a `video` grant
//! scoped to one room. The relay verifies the same tokens on websocket
//! upgrade, so issuing and verification live together here.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::OffsetDateTime;

use crate::config::{DEFAULT_TOKEN_TTL_SECS, RoomServerConfig};
use crate::error::ErrorCode;

type HmacSha256 = Hmac<Sha256>;

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    #[error("token encode failed: {0}")]
    Encode(String),
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token issued by unknown key")]
    WrongIssuer,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
}

impl ErrorCode for TokenError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "E_TOKEN_MISSING_FIELD",
            Self::InvalidKey(_) => "E_TOKEN_INVALID_KEY",
            Self::Encode(_) => "E_TOKEN_ENCODE",
            Self::Malformed => "E_TOKEN_MALFORMED",
            Self::BadSignature => "E_TOKEN_SIGNATURE",
            Self::WrongIssuer => "E_TOKEN_ISSUER",
            Self::Expired => "E_TOKEN_EXPIRED",
            Self::NotYetValid => "E_TOKEN_NOT_YET_VALID",
        }
    }
}

// =============================================================================
// CLAIMS
// =============================================================================

/// Room permissions granted by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_subscribe: bool,
}

impl VideoGrant {
    /// Join + publish + subscribe on one room.
    #[must_use]
    pub fn join(room: &str) -> Self {
        Self { room: room.to_owned(), room_join: true, can_publish: true, can_subscribe: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub nbf: i64,
    pub exp: i64,
    pub video: VideoGrant,
}

// =============================================================================
// ISSUER
// =============================================================================

/// Signs and verifies room tokens with one API key/secret pair.
#[derive(Clone)]
pub struct TokenIssuer {
    api_key: String,
    api_secret: String,
    ttl_secs: i64,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), api_secret: api_secret.into(), ttl_secs: DEFAULT_TOKEN_TTL_SECS }
    }

    #[must_use]
    pub fn from_config(config: &RoomServerConfig) -> Self {
        Self::new(&config.api_key, &config.api_secret).with_ttl_secs(config.token_ttl_secs)
    }

    #[must_use]
    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Issue a token granting `identity` access to `room`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns an error if room or identity is blank, the lifetime overflows
    /// the expiry timestamp, or signing fails.
    pub fn issue(&self, room: &str, identity: &str) -> Result<String, TokenError> {
        self.issue_at(room, identity, OffsetDateTime::now_utc().unix_timestamp())
    }

    pub(crate) fn issue_at(&self, room: &str, identity: &str, now: i64) -> Result<String, TokenError> {
        if room.trim().is_empty() {
            return Err(TokenError::MissingField("room"));
        }
        if identity.trim().is_empty() {
            return Err(TokenError::MissingField("identity"));
        }

        let exp = now
            .checked_add(self.ttl_secs)
            .ok_or_else(|| TokenError::Encode(format!("ttl of {}s overflows the expiry", self.ttl_secs)))?;
        let claims = Claims {
            iss: self.api_key.clone(),
            sub: identity.to_owned(),
            nbf: now,
            exp,
            video: VideoGrant::join(room),
        };
        let claims_json = serde_json::to_vec(&claims).map_err(|e| TokenError::Encode(e.to_string()))?;

        let signing_input = format!("{}.{}", URL_SAFE_NO_PAD.encode(JWT_HEADER), URL_SAFE_NO_PAD.encode(claims_json));
        let signature = self.sign(signing_input.as_bytes())?;
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Verify signature, issuer and validity window; return the claims.
    ///
    /// # Errors
    ///
    /// Returns the first check that fails.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc().unix_timestamp())
    }

    pub(crate) fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header), Some(body), Some(sig), None) = (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(sig)
            .map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(body.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&claims_json).map_err(|_| TokenError::Malformed)?;

        if claims.iss != self.api_key {
            return Err(TokenError::WrongIssuer);
        }
        if now < claims.nbf {
            return Err(TokenError::NotYetValid);
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.api_secret.as_bytes()).map_err(|e| TokenError::InvalidKey(e.to_string()))
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = self.mac()?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
