// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use feedsync::cache::FeedCache;
use feedsync::config::Config;
use feedsync::reconcile::Reconciler;
use feedsync::store::ChangeStream;
use feedsync::store::interval::IntervalChangeStream;
use feedsync::store::postgrest::PostgrestStore;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "feedsync.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store = Arc::new(
        PostgrestStore::new(&config.store_url, &config.store_api_key)
            .expect("Failed to construct store client"),
    );

    let cache = FeedCache::new(store, config.viewer_id.clone());

    // Initial refresh with retry, the store may not be reachable yet.
    let mut retry_count = 0;
    loop {
        match cache.refresh().await {
            Ok(()) => break,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to load feed after 5 retries: {}", e);
                }
                tracing::warn!(
                    "Store not ready, retrying in 2s... (Attempt {})",
                    retry_count
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }

    tracing::info!(posts = cache.snapshot().posts.len(), "Feed loaded.");

    // Keep the feed fresh off the fallback interval stream until a realtime
    // channel is wired in.
    let stream = IntervalChangeStream::new(Duration::from_secs(config.poll_secs));
    let events = stream
        .subscribe(&["posts", "reactions", "comments"])
        .await
        .expect("Failed to subscribe to change stream");
    let reconciler = Reconciler::spawn(
        cache.clone(),
        events,
        Duration::from_millis(config.debounce_ms),
    );

    tracing::info!("Feed engine running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl-c");

    reconciler.shutdown();
    tracing::info!("Shut down.");
}
