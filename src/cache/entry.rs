//! Local-tier cache entry with TTL and access tracking

use chrono::{DateTime, Utc};
use std::time::Duration;

/// A local-tier cache entry
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,

    /// When the value was written
    pub stored_at: DateTime<Utc>,

    /// Last read or write
    pub last_accessed: DateTime<Utc>,

    /// Time-to-live measured from `stored_at`
    pub ttl: Duration,

    /// Number of reads served from this entry
    pub access_count: u64,

    /// Position in the LRU order; larger is more recent
    pub access_seq: u64,
}

impl<V> CacheEntry<V> {
    /// Create a new entry stamped with the current time
    pub fn new(value: V, ttl: Duration, access_seq: u64) -> Self {
        let now = Utc::now();

        Self {
            value,
            stored_at: now,
            last_accessed: now,
            ttl,
            access_count: 0,
            access_seq,
        }
    }

    /// Age of the entry
    pub fn age(&self) -> Duration {
        (Utc::now() - self.stored_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    /// Check if the entry has outlived its TTL
    pub fn is_expired(&self) -> bool {
        self.age() > self.ttl
    }

    /// Time left before expiry, `None` once expired
    pub fn time_until_expiration(&self) -> Option<Duration> {
        self.ttl.checked_sub(self.age())
    }

    /// Mark the entry as read
    pub fn mark_accessed(&mut self, access_seq: u64) {
        self.last_accessed = Utc::now();
        self.access_count += 1;
        self.access_seq = access_seq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_cache_entry_creation() {
        let entry = CacheEntry::new("value".to_string(), Duration::from_secs(3600), 1);

        assert_eq!(entry.value, "value");
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.access_seq, 1);
        assert_eq!(entry.stored_at, entry.last_accessed);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(42u32, Duration::from_millis(100), 1);

        assert!(!entry.is_expired());
        sleep(Duration::from_millis(150));
        assert!(entry.is_expired());
        assert!(entry.time_until_expiration().is_none());
    }

    #[test]
    fn test_mark_accessed() {
        let mut entry = CacheEntry::new(1u8, Duration::from_secs(3600), 1);
        let initial_time = entry.last_accessed;

        sleep(Duration::from_millis(10));
        entry.mark_accessed(7);

        assert_eq!(entry.access_count, 1);
        assert_eq!(entry.access_seq, 7);
        assert!(entry.last_accessed > initial_time);
        assert_eq!(entry.stored_at, initial_time);
    }

    #[test]
    fn test_time_until_expiration() {
        let entry = CacheEntry::new((), Duration::from_secs(3600), 0);

        let time_left = entry.time_until_expiration();
        assert!(time_left.is_some());
        assert!(time_left.unwrap() <= Duration::from_secs(3600));
    }
}
