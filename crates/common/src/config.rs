use std::time::Duration;

use crate::{ApiCredentials, FeedMode};

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    pub feed_mode: FeedMode,

    // Feed credentials
    pub credentials: ApiCredentials,

    /// WebSocket endpoint. Required in live mode only.
    pub feed_url: Option<String>,

    /// Deadline for one auth handshake, measured from the request.
    pub auth_timeout: Duration,

    // Paper transport
    pub paper_auth_latency: Duration,
    pub paper_auth_approve: bool,
}

impl Config {
    pub const DEFAULT_AUTH_TIMEOUT_MS: u64 = 1_000;

    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).unwrap_or_else(|| {
                panic!("Required environment variable '{key}' is not set. Check your .env file.")
            })
        };

        let feed_mode = match required("FEED_MODE").to_lowercase().as_str() {
            "paper" => FeedMode::Paper,
            "live" => FeedMode::Live,
            other => panic!("ERROR: FEED_MODE must be 'paper' or 'live', got: '{other}'"),
        };

        let feed_url = lookup("FEED_URL");
        if feed_mode == FeedMode::Live && feed_url.is_none() {
            panic!("FEED_URL must be set when FEED_MODE=live");
        }

        let millis = |key: &str, default: u64| {
            Duration::from_millis(
                lookup(key)
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(default),
            )
        };

        Config {
            feed_mode,
            credentials: ApiCredentials::new(required("FEED_API_KEY"), required("FEED_API_SECRET")),
            feed_url,
            auth_timeout: millis("AUTH_TIMEOUT_MS", Self::DEFAULT_AUTH_TIMEOUT_MS),
            paper_auth_latency: millis("PAPER_AUTH_LATENCY_MS", 50),
            paper_auth_approve: lookup("PAPER_AUTH_APPROVE")
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
        }
    }
}
