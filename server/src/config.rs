//! Service Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Default system prompt used when a join request does not supply one.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a friendly and helpful voice assistant. You speak clearly and concisely.";

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Control API bind address (e.g., "0.0.0.0:8000")
    pub bind_address: String,

    /// WHIP signaling server host
    pub signaling_host: String,

    /// WHIP signaling server port
    pub signaling_port: u16,

    /// API key for the downstream completion backend
    pub openai_api_key: String,

    /// Base URL for the downstream completion backend
    pub openai_base_url: String,

    /// Default system prompt for agents
    pub agent_default_prompt: String,

    /// WebRTC STUN server
    pub stun_server: String,

    /// Request timeout for the SDP exchange with the signaling server,
    /// in seconds. This also bounds how long a join can hang on signaling.
    pub signaling_request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails fast when required credentials are absent.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".into()),
            signaling_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            signaling_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            agent_default_prompt: env::var("AGENT_DEFAULT_PROMPT")
                .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.into()),
            stun_server: env::var("STUN_SERVER")
                .unwrap_or_else(|_| "stun:stun.l.google.com:19302".into()),
            signaling_request_timeout_secs: env::var("SIGNALING_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        })
    }

    /// WHIP endpoint URL for a room.
    #[must_use]
    pub fn whip_url(&self, room_id: &str) -> String {
        format!(
            "http://{}:{}/whip?room={room_id}",
            self.signaling_host, self.signaling_port
        )
    }

    /// Create a default configuration for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".into(),
            signaling_host: "127.0.0.1".into(),
            signaling_port: 8080,
            openai_api_key: "test-key".into(),
            openai_base_url: "https://api.openai.com/v1".into(),
            agent_default_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            // Host candidates only: keeps ICE gathering local in tests.
            stun_server: String::new(),
            signaling_request_timeout_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whip_url_carries_room_query() {
        let config = Config::default_for_test();
        assert_eq!(
            config.whip_url("lobby"),
            "http://127.0.0.1:8080/whip?room=lobby"
        );
    }

    #[test]
    fn default_for_test_uses_default_prompt() {
        let config = Config::default_for_test();
        assert_eq!(config.agent_default_prompt, DEFAULT_SYSTEM_PROMPT);
    }
}
