//! Core type definitions for the cache system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key type
pub type CacheKey = String;

/// Hit/miss counters for one tier
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TierMetrics {
    /// Total number of hits
    pub hits: u64,

    /// Total number of misses
    pub misses: u64,

    /// Hits as a percentage of lookups
    pub hit_rate: f64,

    /// Number of entries, when the tier can report it cheaply
    pub size: Option<usize>,
}

impl TierMetrics {
    /// Build metrics from raw counters
    pub fn from_counts(hits: u64, misses: u64, size: Option<usize>) -> Self {
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        };

        Self {
            hits,
            misses,
            hit_rate,
            size,
        }
    }

    /// Total lookups recorded
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Snapshot of both tiers' counters
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CacheMetrics {
    /// In-process tier
    pub local: TierMetrics,

    /// Remote tier
    pub remote: TierMetrics,

    /// Local entries evicted to respect capacity
    pub evictions_capacity: u64,

    /// Local entries removed after outliving their TTL
    pub evictions_ttl: u64,

    /// Remote operations that failed or timed out
    pub remote_errors: u64,
}

impl CacheMetrics {
    /// Hit rate across both tiers, as a percentage of all `get` calls
    pub fn overall_hit_rate(&self) -> f64 {
        // every remote lookup follows a local miss
        let lookups = self.local.lookups();
        if lookups == 0 {
            0.0
        } else {
            ((self.local.hits + self.remote.hits) as f64 / lookups as f64) * 100.0
        }
    }
}

impl fmt::Display for CacheMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheMetrics {{ local: {}/{} hits ({:.2}%), remote: {}/{} hits ({:.2}%), entries: {}, evictions: {}, remote_errors: {} }}",
            self.local.hits,
            self.local.lookups(),
            self.local.hit_rate,
            self.remote.hits,
            self.remote.lookups(),
            self.remote.hit_rate,
            self.local.size.unwrap_or(0),
            self.evictions_capacity + self.evictions_ttl,
            self.remote_errors
        )
    }
}

/// Health status of a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Responsive
    Healthy,
    /// Responsive but slower than the degraded threshold
    Degraded,
    /// Unreachable or erroring
    Down,
    /// Tier not configured
    Disabled,
}

impl HealthStatus {
    /// Check if the tier can serve traffic
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Health of a single tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierHealth {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl TierHealth {
    pub(crate) fn new(status: HealthStatus, response_time_ms: u64, error: Option<String>) -> Self {
        Self {
            status,
            response_time_ms,
            timestamp: Utc::now(),
            error,
        }
    }
}

/// Health of both tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub local: TierHealth,
    pub remote: TierHealth,
}

impl CacheHealth {
    /// The cache always serves from the local tier, so only a degraded
    /// or down remote tier lowers the overall status.
    pub fn overall(&self) -> HealthStatus {
        match self.remote.status {
            HealthStatus::Healthy | HealthStatus::Disabled => HealthStatus::Healthy,
            HealthStatus::Degraded | HealthStatus::Down => HealthStatus::Degraded,
        }
    }
}
