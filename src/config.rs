// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub store_url: String,
    pub store_api_key: String,
    /// The signed-in viewer, resolved by the auth collaborator. None means
    /// an anonymous session: the feed still loads, mutations are rejected.
    pub viewer_id: Option<String>,
    /// Debounce window for collapsing change-event bursts, in milliseconds.
    pub debounce_ms: u64,
    /// Fallback polling period when no realtime channel is available.
    pub poll_secs: u64,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let store_url = env::var("STORE_URL").expect("STORE_URL must be set");

        let store_api_key = env::var("STORE_API_KEY").expect("STORE_API_KEY must be set");

        let viewer_id = env::var("FEED_VIEWER_ID").ok();

        let debounce_ms = env::var("FEED_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        let poll_secs = env::var("FEED_POLL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            store_url,
            store_api_key,
            viewer_id,
            debounce_ms,
            poll_secs,
            rust_log,
        }
    }
}
