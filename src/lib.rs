//! # docqa-core
//!
//! Caching and context-budget core for a document question-answering
//! service.
//!
//! ## Features
//!
//! - Two-tier cache: bounded in-process LRU tier over an optional Redis tier
//! - Graceful degradation when Redis is slow or unreachable
//! - Embedding cache with order-independent keys and batch-size TTLs
//! - Search result cache keyed by query, document filter and `top_k`
//! - Conversation pruning to token/character budgets, with RAG allocation
//!
//! ## Tiered Cache
//!
//! ```no_run
//! use docqa_core::{CacheConfig, TieredCache};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CacheConfig::builder()
//!         .remote_url("redis://localhost:6379")
//!         .build();
//!
//!     let cache: TieredCache<Vec<f32>> = TieredCache::new(config).await?;
//!     cache.set("vector:1", vec![0.1, 0.2, 0.3], None).await?;
//!
//!     let health = cache.health_check().await;
//!     println!("Remote tier: {:?}", health.remote.status);
//!
//!     cache.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Embedding Cache
//!
//! ```no_run
//! use docqa_core::embedding::{EmbeddingCacheAdapter, EmbeddingResult, InputType};
//! use docqa_core::{CacheConfig, TieredCache};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = Arc::new(TieredCache::<EmbeddingResult>::new(CacheConfig::from_env()?).await?);
//!     let adapter = EmbeddingCacheAdapter::new(cache, "embed-english-v3.0");
//!
//!     let request = adapter.request(vec!["refund policy".to_string()], InputType::SearchQuery);
//!     if adapter.get(&request).await.is_none() {
//!         // call the embedding provider, then adapter.put(&request, &result)
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod embedding;
pub mod error;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheConfigBuilder, CacheHealth, CacheKey, CacheKeyBuilder, CacheMetrics,
    ContextType, HealthStatus, MemoryStore, RedisStore, RemoteStore, SearchResultCache,
    TieredCache,
};
pub use context::{ContextBudgetManager, ContextOptions, Message, PruneResult, Role};
pub use embedding::{EmbeddingCacheAdapter, EmbeddingProvider, EmbeddingRequest, InputType};
pub use error::{CacheError, ErrorKind, Result};
