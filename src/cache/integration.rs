//! Typed caches layered over [`TieredCache`]
//!
//! This module provides the key scheme shared by the domain caches and the
//! search-result cache used by the retrieval path:
//! - `CacheKeyBuilder` / `ContextType` for readable, namespaced keys
//! - `content_hash` for content-addressed identifiers
//! - `SearchResultCache` for ranked retrieval results

use crate::cache::{tiered::TieredCache, types::CacheKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Lifetime of cached search results
pub const SEARCH_RESULT_TTL: Duration = Duration::from_secs(3600);

/// Context type for categorizing cache entries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextType {
    /// Embedding vectors for a batch of texts
    Embedding,

    /// Ranked retrieval results for a query
    SearchResult,

    /// Custom context type
    Custom(String),
}

impl std::fmt::Display for ContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextType::Embedding => write!(f, "embedding"),
            ContextType::SearchResult => write!(f, "search_result"),
            ContextType::Custom(s) => write!(f, "custom:{}", s),
        }
    }
}

/// Cache key builder
///
/// Keys take the form `type:segment[:segment...]`.
pub struct CacheKeyBuilder {
    context_type: ContextType,
    segments: Vec<String>,
}

impl CacheKeyBuilder {
    /// Create a new cache key builder
    pub fn new(context_type: ContextType) -> Self {
        Self {
            context_type,
            segments: Vec::new(),
        }
    }

    /// Append a `:`-separated identifier segment
    pub fn identifier(mut self, id: impl Into<String>) -> Self {
        self.segments.push(id.into());
        self
    }

    /// Build the cache key
    pub fn build(self) -> CacheKey {
        let mut key = self.context_type.to_string();
        for segment in &self.segments {
            key.push(':');
            key.push_str(segment);
        }
        key
    }
}

/// Lowercase hex SHA-256 of `bytes`
pub fn content_hash(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

/// One ranked chunk returned by retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: String,
    pub chunk_id: String,
    pub content: String,
    pub score: f32,
    pub page: Option<u32>,
}

/// Search results as stored in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSearchResults {
    /// The original query
    pub query: String,

    /// Hits in ranked order
    pub hits: Vec<SearchHit>,

    /// When retrieval produced these results
    pub cached_at: DateTime<Utc>,
}

/// Cache for retrieval results keyed by query, document filter and `top_k`
///
/// Cache failures never surface: a failed lookup is a miss and a failed
/// write is logged.
pub struct SearchResultCache {
    cache: Arc<TieredCache<CachedSearchResults>>,
    ttl: Duration,
}

impl SearchResultCache {
    /// Create a search result cache over an existing tiered cache
    pub fn new(cache: Arc<TieredCache<CachedSearchResults>>) -> Self {
        Self {
            cache,
            ttl: SEARCH_RESULT_TTL,
        }
    }

    /// Override the entry lifetime
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cache key for a search; independent of document id order
    pub fn cache_key(query: &str, document_ids: &[String], top_k: usize) -> CacheKey {
        let mut sorted_ids: Vec<&str> = document_ids.iter().map(String::as_str).collect();
        sorted_ids.sort_unstable();
        sorted_ids.dedup();

        let canonical = serde_json::json!([query, sorted_ids, top_k]).to_string();

        CacheKeyBuilder::new(ContextType::SearchResult)
            .identifier(content_hash(canonical.as_bytes()))
            .build()
    }

    /// Get cached results
    pub async fn get(
        &self,
        query: &str,
        document_ids: &[String],
        top_k: usize,
    ) -> Option<CachedSearchResults> {
        let key = Self::cache_key(query, document_ids, top_k);
        let cached = self.cache.get(&key).await;
        if cached.is_some() {
            debug!("Search cache hit for query: {}", query);
        }
        cached
    }

    /// Store search results
    pub async fn put(&self, query: &str, document_ids: &[String], top_k: usize, hits: Vec<SearchHit>) {
        let key = Self::cache_key(query, document_ids, top_k);
        let results = CachedSearchResults {
            query: query.to_string(),
            hits,
            cached_at: Utc::now(),
        };

        if let Err(e) = self.cache.set(&key, results, Some(self.ttl)).await {
            warn!("Failed to cache search results for {}: {}", query, e);
        }
    }

    /// Invalidate cached results for a search
    pub async fn invalidate(&self, query: &str, document_ids: &[String], top_k: usize) {
        let key = Self::cache_key(query, document_ids, top_k);
        if let Err(e) = self.cache.delete(&key).await {
            warn!("Failed to invalidate search results for {}: {}", query, e);
        }
    }

    /// Get the underlying cache
    pub fn inner(&self) -> &Arc<TieredCache<CachedSearchResults>> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheConfig;

    fn hit(doc: &str, chunk: &str, score: f32) -> SearchHit {
        SearchHit {
            document_id: doc.to_string(),
            chunk_id: chunk.to_string(),
            content: format!("content of {}", chunk),
            score,
            page: Some(1),
        }
    }

    fn search_cache() -> SearchResultCache {
        let config = CacheConfig::builder().enable_auto_cleanup(false).build();
        SearchResultCache::new(Arc::new(TieredCache::local_only(config).unwrap()))
    }

    #[test]
    fn test_cache_key_builder() {
        let key = CacheKeyBuilder::new(ContextType::Embedding)
            .identifier("search_query")
            .identifier("2")
            .build();

        assert_eq!(key, "embedding:search_query:2");
    }

    #[test]
    fn test_context_type_display() {
        assert_eq!(ContextType::Embedding.to_string(), "embedding");
        assert_eq!(ContextType::SearchResult.to_string(), "search_result");
        assert_eq!(ContextType::Custom("chat".to_string()).to_string(), "custom:chat");
    }

    #[test]
    fn test_content_hash_known_value() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(content_hash(b"").len(), 64);
    }

    #[test]
    fn test_search_key_ignores_document_order() {
        let a = SearchResultCache::cache_key(
            "what is the refund policy?",
            &["doc-2".to_string(), "doc-1".to_string()],
            5,
        );
        let b = SearchResultCache::cache_key(
            "what is the refund policy?",
            &["doc-1".to_string(), "doc-2".to_string()],
            5,
        );
        let c = SearchResultCache::cache_key(
            "what is the refund policy?",
            &["doc-1".to_string(), "doc-2".to_string()],
            10,
        );

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("search_result:"));
    }

    #[tokio::test]
    async fn test_search_cache_round_trip() {
        let cache = search_cache();
        let docs = vec!["doc-1".to_string()];

        assert!(cache.get("revenue 2023", &docs, 3).await.is_none());

        cache
            .put("revenue 2023", &docs, 3, vec![hit("doc-1", "c1", 0.92), hit("doc-1", "c7", 0.81)])
            .await;

        let cached = cache.get("revenue 2023", &docs, 3).await.unwrap();
        assert_eq!(cached.query, "revenue 2023");
        assert_eq!(cached.hits.len(), 2);
        assert_eq!(cached.hits[0].chunk_id, "c1");

        cache.invalidate("revenue 2023", &docs, 3).await;
        assert!(cache.get("revenue 2023", &docs, 3).await.is_none());
    }

    #[tokio::test]
    async fn test_search_cache_custom_ttl() {
        let cache = search_cache().with_ttl(Duration::from_millis(30));
        let docs = vec!["doc-1".to_string()];

        cache.put("q", &docs, 1, vec![hit("doc-1", "c1", 0.5)]).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.get("q", &docs, 1).await.is_none());
    }
}
