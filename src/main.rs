//! Memo Cache demo
//!
//! Exercises a cache built from environment configuration: a burst of
//! concurrent callers on one key, a pattern invalidation, and a stats dump.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memo_cache::{Cache, Config, Selector, TracingSink};

/// Number of concurrent callers racing for the same key.
const CALLERS: usize = 8;

/// Main entry point for the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Race concurrent callers on one key; the producer runs once
/// 4. Populate a few more keys and clear them by pattern
/// 5. Print statistics as JSON
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memo_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, default_ttl={}s",
        config.max_entries, config.default_ttl
    );

    let cache: Cache<String> = Cache::with_sink(config, Arc::new(TracingSink));
    let runs = Arc::new(AtomicUsize::new(0));

    let mut callers = Vec::with_capacity(CALLERS);
    for caller in 0..CALLERS {
        let cache = cache.clone();
        let runs = runs.clone();
        callers.push(tokio::spawn(async move {
            cache
                .get_with("report:daily", None, || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    format!("report built by caller {}", caller)
                })
                .await
        }));
    }

    for handle in callers {
        let value = handle.await.context("caller task failed")?;
        info!("Caller received: {}", value);
    }
    info!(
        "{} callers, producer ran {} time(s)",
        CALLERS,
        runs.load(Ordering::SeqCst)
    );

    for user in 1..=3 {
        cache
            .get_with(&format!("user:{}", user), Some(30), || async move {
                format!("profile {}", user)
            })
            .await;
    }
    cache.clear(Selector::pattern("^user:")?);
    info!("Entries after clearing users: {}", cache.len());

    println!("{}", serde_json::to_string_pretty(&cache.stats())?);
    Ok(())
}
