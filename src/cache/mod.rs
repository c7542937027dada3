//! # Tiered Caching Layer
//!
//! A two-tier cache used to avoid recomputing embeddings and re-running
//! searches.
//!
//! ## Features
//!
//! - **Local tier**: bounded in-process store with LRU eviction
//! - **Remote tier**: optional Redis (or any [`RemoteStore`]) behind every write
//! - **TTL expiry**: lazily on access and proactively by a background sweep
//! - **Graceful degradation**: a slow or unreachable remote tier turns into
//!   local-only behaviour for that call, never an error
//! - **Metrics and health**: per-tier hit rates, eviction counts, PING health check
//!
//! ## Example
//!
//! ```rust
//! use docqa_core::cache::{CacheConfig, TieredCache};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CacheConfig::builder()
//!     .local_ttl(Duration::from_secs(300))
//!     .local_max_entries(10_000)
//!     .build();
//!
//! let cache: TieredCache<String> = TieredCache::new(config).await?;
//!
//! cache.set("query:123", "cached response".to_string(), None).await?;
//!
//! if let Some(value) = cache.get("query:123").await {
//!     println!("Cache hit: {}", value);
//! }
//!
//! cache.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod integration;
pub mod invalidation;
pub mod remote;
mod store;
pub mod tiered;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::CacheEntry;
pub use integration::{
    content_hash, CacheKeyBuilder, CachedSearchResults, ContextType, SearchHit,
    SearchResultCache, SEARCH_RESULT_TTL,
};
pub use invalidation::{InvalidationEvent, InvalidationReason};
pub use remote::{MemoryStore, RedisStore, RemoteStore};
pub use tiered::TieredCache;
pub use types::{CacheHealth, CacheKey, CacheMetrics, HealthStatus, TierHealth, TierMetrics};
