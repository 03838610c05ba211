//! Configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Each config struct has a pure `from_lookup` constructor taking a key →
//! value closure, and a thin `from_env` wrapper over `std::env::var`. Tests
//! drive `from_lookup` with a map so they never touch process environment.

use crate::error::ErrorCode;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 6 * 60 * 60;
/// Longest token lifetime the server will sign (30 days).
pub const MAX_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;
pub const DEFAULT_ROOM_URL: &str = "ws://127.0.0.1:3000";
pub const DEFAULT_TOKEN_ENDPOINT: &str = "http://127.0.0.1:3000/api/token";

pub const ENV_API_KEY: &str = "ROOM_API_KEY";
pub const ENV_API_SECRET: &str = "ROOM_API_SECRET";
pub const ENV_ROOM_URL: &str = "ROOM_URL";
pub const ENV_TOKEN_TTL_SECS: &str = "ROOM_TOKEN_TTL_SECS";
pub const ENV_TOKEN_ENDPOINT: &str = "ROOM_TOKEN_ENDPOINT";
pub const ENV_PORT: &str = "PORT";
pub const ENV_AGENT_ROOMS: &str = "AGENT_ROOMS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env vars: {}", vars.join(", "))]
    Missing { vars: Vec<&'static str> },
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "E_CONFIG_MISSING",
            Self::Invalid { .. } => "E_CONFIG_INVALID",
        }
    }
}

// =============================================================================
// SERVER
// =============================================================================

/// Signing material and public address for the token endpoint and relay.
///
/// All three of key, secret and URL are required; a server without them
/// refuses every token request.
#[derive(Clone, PartialEq, Eq)]
pub struct RoomServerConfig {
    pub api_key: String,
    pub api_secret: String,
    pub ws_url: String,
    pub token_ttl_secs: i64,
}

impl std::fmt::Debug for RoomServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomServerConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("ws_url", &self.ws_url)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

impl RoomServerConfig {
    /// Load from `ROOM_API_KEY`, `ROOM_API_SECRET`, `ROOM_URL` and the
    /// optional `ROOM_TOKEN_TTL_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming every absent variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a required key is absent or the TTL is not an
    /// integer in `1..=MAX_TOKEN_TTL_SECS`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let api_key = get(ENV_API_KEY);
        let api_secret = get(ENV_API_SECRET);
        let ws_url = get(ENV_ROOM_URL);

        let (Some(api_key), Some(api_secret), Some(ws_url)) = (api_key.clone(), api_secret.clone(), ws_url.clone())
        else {
            let vars = [(ENV_API_KEY, api_key), (ENV_API_SECRET, api_secret), (ENV_ROOM_URL, ws_url)]
                .into_iter()
                .filter(|(_, v)| v.is_none())
                .map(|(k, _)| k)
                .collect();
            return Err(ConfigError::Missing { vars });
        };

        let token_ttl_secs = match get(ENV_TOKEN_TTL_SECS) {
            None => DEFAULT_TOKEN_TTL_SECS,
            Some(raw) => match raw.parse::<i64>() {
                Ok(secs) if (1..=MAX_TOKEN_TTL_SECS).contains(&secs) => secs,
                _ => return Err(ConfigError::Invalid { var: ENV_TOKEN_TTL_SECS, value: raw }),
            },
        };

        Ok(Self { api_key, api_secret, ws_url: ws_url.trim_end_matches('/').to_owned(), token_ttl_secs })
    }
}

/// Listening port from `PORT`, defaulting to 3000.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if `PORT` is set but not a valid port.
pub fn port_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<u16, ConfigError> {
    match lookup(ENV_PORT) {
        None => Ok(DEFAULT_PORT),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var: ENV_PORT, value: raw }),
    }
}

/// Rooms the in-process assistant should sit in, from the comma-separated
/// `AGENT_ROOMS`. Empty when unset; the assistant is then not started.
#[must_use]
pub fn agent_rooms_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
    let mut rooms: Vec<String> = Vec::new();
    for room in lookup(ENV_AGENT_ROOMS).unwrap_or_default().split(',').map(str::trim) {
        if !room.is_empty() && !rooms.iter().any(|r| r == room) {
            rooms.push(room.to_owned());
        }
    }
    rooms
}

// =============================================================================
// CLIENT
// =============================================================================

/// Addresses a live session needs: where to fetch tokens, where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub token_endpoint: String,
    pub room_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_owned(), room_url: DEFAULT_ROOM_URL.to_owned() }
    }
}

impl ClientConfig {
    /// Load from `ROOM_TOKEN_ENDPOINT` and `ROOM_URL`, with local defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_owned())
        };
        Self {
            token_endpoint: get(ENV_TOKEN_ENDPOINT, DEFAULT_TOKEN_ENDPOINT),
            room_url: get(ENV_ROOM_URL, DEFAULT_ROOM_URL)
                .trim_end_matches('/')
                .to_owned(),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
