//! Embedding cache over [`TieredCache`]
//!
//! Nothing here fails the embedding path: lookups that go wrong are misses
//! and writes that go wrong are skipped.

use crate::cache::{CacheKey, TieredCache};
use crate::embedding::key::{EmbeddingRequest, EmbeddingResult, InputType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// External embedding provider
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, request: &EmbeddingRequest) -> anyhow::Result<EmbeddingResult>;
}

/// Adapter-level counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Cached values discarded because they failed validation
    pub rejected: u64,
    /// Writes not performed because the value was invalid or the cache refused it
    pub skipped_writes: u64,
}

/// Caches provider output per request
pub struct EmbeddingCacheAdapter {
    cache: Arc<TieredCache<EmbeddingResult>>,
    model: String,
    hits: AtomicU64,
    misses: AtomicU64,
    rejected: AtomicU64,
    skipped_writes: AtomicU64,
}

impl EmbeddingCacheAdapter {
    /// Create an adapter for `model` over an existing cache
    pub fn new(cache: Arc<TieredCache<EmbeddingResult>>, model: impl Into<String>) -> Self {
        Self {
            cache,
            model: model.into(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            skipped_writes: AtomicU64::new(0),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build a request for this adapter's model
    pub fn request(&self, texts: Vec<String>, input_type: InputType) -> EmbeddingRequest {
        EmbeddingRequest::new(texts, input_type, self.model.clone())
    }

    /// Cached embeddings for `request`, if present and well-formed
    pub async fn get(&self, request: &EmbeddingRequest) -> Option<EmbeddingResult> {
        if request.is_empty() {
            return None;
        }

        let key = request.cache_key();
        let Some(cached) = self.cache.get(&key).await else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if let Err(e) = cached.validate(request.len()) {
            warn!("Discarding cached embeddings {}: {}", key, e);
            self.rejected.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            self.remove(&key).await;
            return None;
        }

        debug!("Embedding cache hit: {} ({} texts)", key, request.len());
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(cached)
    }

    /// Cache embeddings for `request`, with a lifetime chosen by batch size
    ///
    /// Returns whether the value was stored.
    pub async fn put(&self, request: &EmbeddingRequest, result: &EmbeddingResult) -> bool {
        if request.is_empty() {
            return false;
        }

        if let Err(e) = result.validate(request.len()) {
            warn!("Not caching malformed embeddings: {}", e);
            self.skipped_writes.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let key = request.cache_key();
        match self.cache.set(&key, result.clone(), Some(request.ttl())).await {
            Ok(()) => {
                debug!(
                    "Cached embeddings {} for {:?}",
                    key,
                    request.ttl()
                );
                true
            }
            Err(e) => {
                warn!("Skipping embedding cache write {}: {}", key, e);
                self.skipped_writes.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Serve from cache, or call the provider and cache its output
    ///
    /// Provider errors propagate; cache errors never do.
    pub async fn get_or_embed(
        &self,
        request: &EmbeddingRequest,
        provider: &dyn EmbeddingProvider,
    ) -> anyhow::Result<EmbeddingResult> {
        if let Some(cached) = self.get(request).await {
            return Ok(cached);
        }

        let result = provider.embed(request).await?;
        self.put(request, &result).await;
        Ok(result)
    }

    /// Remove the single-text entries of every input type for each text
    ///
    /// Returns the number of keys targeted.
    pub async fn invalidate_texts(&self, texts: &[String]) -> usize {
        let mut targeted = 0;
        for text in texts {
            for input_type in InputType::ALL {
                let key = self.request(vec![text.clone()], input_type).cache_key();
                self.remove(&key).await;
                targeted += 1;
            }
        }

        debug!(
            "Invalidated {} embedding keys for {} texts",
            targeted,
            texts.len()
        );
        targeted
    }

    pub fn stats(&self) -> EmbeddingCacheStats {
        EmbeddingCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            skipped_writes: self.skipped_writes.load(Ordering::Relaxed),
        }
    }

    async fn remove(&self, key: &CacheKey) {
        if let Err(e) = self.cache.delete(key).await {
            warn!("Failed to remove embedding cache entry {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, MemoryStore, RemoteStore};
    use crate::embedding::key::{LARGE_BATCH_TTL, SMALL_BATCH_TTL};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const MODEL: &str = "embed-english-v3.0";

    /// Provider returning a fixed 3-dimensional vector per text
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, request: &EmbeddingRequest) -> anyhow::Result<EmbeddingResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EmbeddingResult {
                embeddings: request
                    .texts
                    .iter()
                    .map(|t| vec![t.len() as f32, 0.5, -0.5])
                    .collect(),
                total_tokens: request.texts.len() as u32 * 4,
                model: request.model.clone(),
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _request: &EmbeddingRequest) -> anyhow::Result<EmbeddingResult> {
            anyhow::bail!("provider quota exceeded")
        }
    }

    fn config() -> CacheConfig {
        CacheConfig::builder().enable_auto_cleanup(false).build()
    }

    fn adapter() -> EmbeddingCacheAdapter {
        EmbeddingCacheAdapter::new(Arc::new(TieredCache::local_only(config()).unwrap()), MODEL)
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_get_or_embed_calls_provider_once() {
        let adapter = adapter();
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
        };

        let first = adapter.request(texts(&["a", "bb"]), InputType::SearchQuery);
        let permuted = adapter.request(texts(&["bb", "a"]), InputType::SearchQuery);

        adapter.get_or_embed(&first, &provider).await.unwrap();
        adapter.get_or_embed(&permuted, &provider).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        let stats = adapter.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let adapter = adapter();
        let request = adapter.request(texts(&["a"]), InputType::SearchQuery);

        let err = adapter.get_or_embed(&request, &FailingProvider).await.unwrap_err();
        assert!(err.to_string().contains("quota"));
    }

    #[tokio::test]
    async fn test_malformed_result_is_not_cached() {
        let adapter = adapter();
        let request = adapter.request(texts(&["a", "b"]), InputType::SearchDocument);
        let short = EmbeddingResult {
            embeddings: vec![vec![0.1]],
            total_tokens: 1,
            model: MODEL.to_string(),
        };

        assert!(!adapter.put(&request, &short).await);
        assert_eq!(adapter.stats().skipped_writes, 1);
        assert!(adapter.get(&request).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_cached_value_is_deleted() {
        let cache = Arc::new(TieredCache::local_only(config()).unwrap());
        let adapter = EmbeddingCacheAdapter::new(cache.clone(), MODEL);
        let request = adapter.request(texts(&["a", "b"]), InputType::SearchDocument);

        // bypass adapter validation
        let wrong_count = EmbeddingResult {
            embeddings: vec![vec![0.1, 0.2]],
            total_tokens: 1,
            model: MODEL.to_string(),
        };
        cache.set(&request.cache_key(), wrong_count, None).await.unwrap();

        assert!(adapter.get(&request).await.is_none());
        assert!(!cache.contains_local(&request.cache_key()).await);
        assert_eq!(adapter.stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_batch_ttl_applied() {
        let cache = Arc::new(TieredCache::local_only(config()).unwrap());
        let adapter = EmbeddingCacheAdapter::new(cache.clone(), MODEL);
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
        };

        let small = adapter.request(texts(&["q"]), InputType::SearchQuery);
        let large_texts: Vec<String> = (0..20).map(|i| format!("chunk {}", i)).collect();
        let large = adapter.request(large_texts, InputType::SearchDocument);

        adapter.get_or_embed(&small, &provider).await.unwrap();
        adapter.get_or_embed(&large, &provider).await.unwrap();

        let small_ttl = cache.local_ttl_remaining(&small.cache_key()).await.unwrap();
        let large_ttl = cache.local_ttl_remaining(&large.cache_key()).await.unwrap();
        assert!(small_ttl <= SMALL_BATCH_TTL);
        assert!(small_ttl > SMALL_BATCH_TTL - Duration::from_secs(60));
        assert!(large_ttl > SMALL_BATCH_TTL);
        assert!(large_ttl <= LARGE_BATCH_TTL);
    }

    #[tokio::test]
    async fn test_invalidate_texts_covers_every_input_type() {
        let remote = Arc::new(MemoryStore::new());
        let cache = Arc::new(TieredCache::with_remote(config(), remote.clone()).unwrap());
        let adapter = EmbeddingCacheAdapter::new(cache.clone(), MODEL);
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
        };

        for input_type in [InputType::SearchDocument, InputType::Clustering] {
            let request = adapter.request(texts(&["stale text"]), input_type);
            adapter.get_or_embed(&request, &provider).await.unwrap();
        }
        assert_eq!(remote.len(), 2);

        let targeted = adapter.invalidate_texts(&texts(&["stale text"])).await;
        assert_eq!(targeted, InputType::ALL.len());
        assert!(cache.is_empty().await);
        assert!(remote.keys("*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_request_bypasses_cache() {
        let adapter = adapter();
        let request = adapter.request(Vec::new(), InputType::SearchQuery);
        let empty = EmbeddingResult {
            embeddings: Vec::new(),
            total_tokens: 0,
            model: MODEL.to_string(),
        };

        assert!(adapter.get(&request).await.is_none());
        assert!(!adapter.put(&request, &empty).await);
        assert_eq!(adapter.stats(), EmbeddingCacheStats::default());
    }
}
