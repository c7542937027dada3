//! Tiered Cache Demo Application
//!
//! Exercises the two-tier cache against the configured Redis and reports
//! metrics and health. Without a reachable Redis the demo still runs on the
//! local tier and reports the remote tier as down.
//!
//! Usage:
//!   cargo run --example cache_health_demo
//!
//! Environment variables:
//!   CACHE_ENV   - Preset: test, development, production (default: development)
//!   REDIS_URL   - Redis connection URI (default: none, local tier only)

use docqa_core::embedding::{EmbeddingCacheAdapter, EmbeddingResult, InputType};
use docqa_core::{CacheConfig, HealthStatus, TieredCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("=== Tiered Cache Demo ===");

    let config = CacheConfig::from_env()?;
    info!(
        "Local tier: {} entries, TTL {:?}; remote tier: {}",
        config.local_max_entries,
        config.local_ttl,
        config.remote_url.as_deref().unwrap_or("disabled")
    );

    let cache = Arc::new(TieredCache::<EmbeddingResult>::new(config).await?);
    let adapter = EmbeddingCacheAdapter::new(cache.clone(), "demo-embed-v1");

    info!("\n--- Embedding cache round trip ---");
    let request = adapter.request(
        vec!["What is the refund window?".to_string()],
        InputType::SearchQuery,
    );
    let result = EmbeddingResult {
        embeddings: vec![vec![0.12, -0.48, 0.33, 0.91]],
        total_tokens: 7,
        model: "demo-embed-v1".to_string(),
    };

    if adapter.get(&request).await.is_none() {
        info!("Miss for {}, storing", request.cache_key());
        adapter.put(&request, &result).await;
    }
    match adapter.get(&request).await {
        Some(cached) => info!("✓ Hit: {} vectors of dimension {:?}", cached.embeddings.len(), cached.dimension()),
        None => warn!("✗ Expected a hit after storing"),
    }

    info!("\n--- Metrics ---");
    info!("{}", cache.metrics().await);
    info!("Adapter: {:?}", adapter.stats());

    info!("\n--- Health check ---");
    for attempt in 1..=3 {
        let health = cache.health_check().await;
        info!(
            "Attempt {}: local {:?}, remote {:?} ({}ms), overall {:?}",
            attempt,
            health.local.status,
            health.remote.status,
            health.remote.response_time_ms,
            health.overall()
        );
        if let Some(error) = &health.remote.error {
            warn!("  Remote error: {}", error);
        }
        if health.remote.status != HealthStatus::Down {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    cache.disconnect().await;
    info!("\n=== Demo Complete ===");
    Ok(())
}
