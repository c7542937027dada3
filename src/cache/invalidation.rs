//! Why entries leave the cache
//!
//! Removals from the local tier are tagged so sweeps, capacity evictions,
//! explicit deletes and rejected payloads can be told apart in logs.

use crate::cache::types::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    /// Outlived its TTL
    Expired,
    /// Least recently used entry dropped to make room
    CapacityEvicted,
    /// Removed by `delete`
    Deleted,
    /// Removed by `clear`
    Cleared,
    /// Remote payload did not decode into the cached type
    Corrupt,
}

impl InvalidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationReason::Expired => "expired",
            InvalidationReason::CapacityEvicted => "capacity_evicted",
            InvalidationReason::Deleted => "deleted",
            InvalidationReason::Cleared => "cleared",
            InvalidationReason::Corrupt => "corrupt",
        }
    }
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys removed together for one reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    pub reason: InvalidationReason,
    pub keys: Vec<CacheKey>,
    pub occurred_at: DateTime<Utc>,
}

impl InvalidationEvent {
    pub(crate) fn new(reason: InvalidationReason, keys: Vec<CacheKey>) -> Self {
        Self {
            reason,
            keys,
            occurred_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

impl fmt::Display for InvalidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} local entries {}", self.keys.len(), self.reason)
    }
}
