//! Embedding request types, cache keys, TTL policy and validation

use crate::cache::{content_hash, CacheKey, CacheKeyBuilder, ContextType};
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Batches larger than this are cached for [`LARGE_BATCH_TTL`]
pub const LARGE_BATCH_THRESHOLD: usize = 10;

/// Lifetime of large batches, typically document ingestion
pub const LARGE_BATCH_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Lifetime of small batches, typically queries
pub const SMALL_BATCH_TTL: Duration = Duration::from_secs(24 * 3600);

/// How the provider should treat the embedded texts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    SearchDocument,
    SearchQuery,
    Classification,
    Clustering,
}

impl InputType {
    /// Every variant, in a fixed order
    pub const ALL: [InputType; 4] = [
        InputType::SearchDocument,
        InputType::SearchQuery,
        InputType::Classification,
        InputType::Clustering,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::SearchDocument => "search_document",
            InputType::SearchQuery => "search_query",
            InputType::Classification => "classification",
            InputType::Clustering => "clustering",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch of texts to embed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub texts: Vec<String>,
    pub input_type: InputType,
    pub model: String,
}

impl EmbeddingRequest {
    pub fn new(texts: Vec<String>, input_type: InputType, model: impl Into<String>) -> Self {
        Self {
            texts,
            input_type,
            model: model.into(),
        }
    }

    /// Number of texts in the batch
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Deterministic cache key
    ///
    /// Format: `embedding:<input_type>:<count>:<sha256>`, where the digest
    /// covers the sorted texts, the input type and the model. Text order
    /// does not affect the key.
    pub fn cache_key(&self) -> CacheKey {
        let mut sorted: Vec<&str> = self.texts.iter().map(String::as_str).collect();
        sorted.sort_unstable();

        let canonical =
            serde_json::json!([sorted, self.input_type.as_str(), self.model]).to_string();

        CacheKeyBuilder::new(ContextType::Embedding)
            .identifier(self.input_type.as_str())
            .identifier(self.texts.len().to_string())
            .identifier(content_hash(canonical.as_bytes()))
            .build()
    }

    /// Cache lifetime for this batch
    pub fn ttl(&self) -> Duration {
        ttl_for_batch(self.texts.len())
    }
}

/// Cache lifetime for a batch of `count` texts
pub fn ttl_for_batch(count: usize) -> Duration {
    if count > LARGE_BATCH_THRESHOLD {
        LARGE_BATCH_TTL
    } else {
        SMALL_BATCH_TTL
    }
}

/// Provider output for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    /// One vector per input text, in request order
    pub embeddings: Vec<Vec<f32>>,

    /// Token usage reported by the provider
    pub total_tokens: u32,

    pub model: String,
}

impl EmbeddingResult {
    /// Vector dimension, if any vectors are present
    pub fn dimension(&self) -> Option<usize> {
        self.embeddings.first().map(Vec::len)
    }

    /// Check the result has the shape expected for `expected_count` texts
    pub fn validate(&self, expected_count: usize) -> Result<()> {
        let Some(dimension) = self.dimension() else {
            return Err(CacheError::ValidationError(
                "embeddings must not be empty".to_string(),
            ));
        };

        if dimension == 0 {
            return Err(CacheError::ValidationError(
                "embedding vectors must not be empty".to_string(),
            ));
        }

        if self.embeddings.len() != expected_count {
            return Err(CacheError::ValidationError(format!(
                "expected {} embeddings, found {}",
                expected_count,
                self.embeddings.len()
            )));
        }

        for (i, vector) in self.embeddings.iter().enumerate() {
            if vector.len() != dimension {
                return Err(CacheError::ValidationError(format!(
                    "embedding {} has dimension {}, expected {}",
                    i,
                    vector.len(),
                    dimension
                )));
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(CacheError::ValidationError(format!(
                    "embedding {} contains a non-finite component",
                    i
                )));
            }
        }

        Ok(())
    }
}
