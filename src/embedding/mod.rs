//! Embedding cache
//!
//! Embedding generation is the most expensive call on the ingestion and
//! query paths. Requests are keyed by their sorted texts, input type and
//! model, so the same batch in any order hits the same entry. Large batches
//! (document ingestion) live longer than small ones (queries).

pub mod adapter;
pub mod key;

pub use adapter::{EmbeddingCacheAdapter, EmbeddingCacheStats, EmbeddingProvider};
pub use key::{
    ttl_for_batch, EmbeddingRequest, EmbeddingResult, InputType, LARGE_BATCH_THRESHOLD,
    LARGE_BATCH_TTL, SMALL_BATCH_TTL,
};
