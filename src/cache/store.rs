//! Local-tier store with LRU eviction and TTL expiry
//!
//! `LocalStore` is a plain synchronous structure; [`TieredCache`] wraps it in
//! an async `RwLock` so foreground calls and the sweep task serialize on the
//! same lock.
//!
//! [`TieredCache`]: crate::cache::TieredCache

use crate::cache::{
    entry::CacheEntry,
    invalidation::{InvalidationEvent, InvalidationReason},
    types::CacheKey,
};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::debug;

/// Outcome of a local lookup
#[derive(Debug, PartialEq)]
pub(crate) enum Lookup<V> {
    Hit(V),
    Expired,
    Missing,
}

/// Running counters for the local tier
#[derive(Debug, Clone, Default)]
pub(crate) struct LocalCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions_capacity: u64,
    pub evictions_ttl: u64,
}

/// Capacity-bounded, TTL-aware in-process store
pub(crate) struct LocalStore<V> {
    /// Main storage: key -> entry
    entries: HashMap<CacheKey, CacheEntry<V>>,

    /// LRU order: access sequence -> key, smallest is least recent
    lru_index: BTreeMap<u64, CacheKey>,

    /// Next access sequence number
    next_seq: u64,

    max_entries: usize,

    pub(crate) counters: LocalCounters,
}

impl<V: Clone> LocalStore<V> {
    pub(crate) fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru_index: BTreeMap::new(),
            next_seq: 0,
            max_entries,
            counters: LocalCounters::default(),
        }
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Look up a key, refreshing its LRU position on a hit
    pub(crate) fn get(&mut self, key: &str) -> Lookup<V> {
        let expired = match self.entries.get(key) {
            None => {
                self.counters.misses += 1;
                return Lookup::Missing;
            }
            Some(entry) => entry.is_expired(),
        };

        if expired {
            debug!("Local entry {}: {}", InvalidationReason::Expired, key);
            self.remove_entry(key);
            self.counters.misses += 1;
            self.counters.evictions_ttl += 1;
            return Lookup::Expired;
        }

        let seq = self.bump_seq();
        let Some(entry) = self.entries.get_mut(key) else {
            return Lookup::Missing;
        };
        let old_seq = entry.access_seq;
        entry.mark_accessed(seq);
        let value = entry.value.clone();

        self.lru_index.remove(&old_seq);
        self.lru_index.insert(seq, key.to_string());
        self.counters.hits += 1;

        Lookup::Hit(value)
    }

    /// Insert or overwrite a key, returning the key evicted to make room
    pub(crate) fn insert(&mut self, key: CacheKey, value: V, ttl: Duration) -> Option<CacheKey> {
        let seq = self.bump_seq();

        if let Some(existing) = self.entries.get(&key) {
            let old_seq = existing.access_seq;
            self.lru_index.remove(&old_seq);
            self.lru_index.insert(seq, key.clone());
            self.entries.insert(key, CacheEntry::new(value, ttl, seq));
            return None;
        }

        let evicted = if self.entries.len() >= self.max_entries {
            self.evict_lru()
        } else {
            None
        };

        self.lru_index.insert(seq, key.clone());
        self.entries.insert(key, CacheEntry::new(value, ttl, seq));

        evicted
    }

    /// Remove a key; true when it was present
    pub(crate) fn remove(&mut self, key: &str) -> bool {
        self.remove_entry(key).is_some()
    }

    /// Drop every entry and reset counters
    pub(crate) fn clear(&mut self) -> InvalidationEvent {
        let keys: Vec<CacheKey> = self.entries.drain().map(|(key, _)| key).collect();
        self.lru_index.clear();
        self.counters = LocalCounters::default();
        InvalidationEvent::new(InvalidationReason::Cleared, keys)
    }

    /// Remove all expired entries
    pub(crate) fn sweep_expired(&mut self) -> InvalidationEvent {
        let expired_keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.remove_entry(key);
        }
        self.counters.evictions_ttl += expired_keys.len() as u64;

        InvalidationEvent::new(InvalidationReason::Expired, expired_keys)
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Peek at an entry without touching LRU state
    pub(crate) fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    fn evict_lru(&mut self) -> Option<CacheKey> {
        let (_, key) = self.lru_index.pop_first()?;
        debug!("Local entry {}: {}", InvalidationReason::CapacityEvicted, key);
        self.entries.remove(&key);
        self.counters.evictions_capacity += 1;
        Some(key)
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru_index.remove(&entry.access_seq);
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_basic_insert_and_get() {
        let mut store = LocalStore::new(10);
        store.insert("key1".to_string(), "value1".to_string(), HOUR);

        assert_eq!(store.get("key1"), Lookup::Hit("value1".to_string()));
        assert_eq!(store.get("missing"), Lookup::Missing);
        assert_eq!(store.counters.hits, 1);
        assert_eq!(store.counters.misses, 1);
    }

    #[test]
    fn test_lru_eviction_prefers_least_recently_accessed() {
        let mut store = LocalStore::new(3);
        store.insert("key1".to_string(), 1, HOUR);
        store.insert("key2".to_string(), 2, HOUR);
        store.insert("key3".to_string(), 3, HOUR);

        // key1 becomes the most recent; key2 is now the oldest
        assert_eq!(store.get("key1"), Lookup::Hit(1));

        let evicted = store.insert("key4".to_string(), 4, HOUR);
        assert_eq!(evicted.as_deref(), Some("key2"));
        assert_eq!(store.len(), 3);
        assert!(store.contains_key("key1"));
        assert!(!store.contains_key("key2"));
        assert_eq!(store.counters.evictions_capacity, 1);
    }

    #[test]
    fn test_eviction_ties_follow_insertion_order() {
        let mut store = LocalStore::new(2);
        store.insert("a".to_string(), 1, HOUR);
        store.insert("b".to_string(), 2, HOUR);

        let evicted = store.insert("c".to_string(), 3, HOUR);
        assert_eq!(evicted.as_deref(), Some("a"));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let mut store = LocalStore::new(2);
        store.insert("a".to_string(), 1, HOUR);
        store.insert("b".to_string(), 2, HOUR);

        assert!(store.insert("a".to_string(), 10, HOUR).is_none());
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a"), Lookup::Hit(10));

        // overwrite refreshed "a", so "b" goes next
        assert_eq!(store.insert("c".to_string(), 3, HOUR).as_deref(), Some("b"));
    }

    #[test]
    fn test_expired_lookup_removes_entry() {
        let mut store = LocalStore::new(10);
        store.insert("k".to_string(), 1, Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(store.get("k"), Lookup::Expired);
        assert!(!store.contains_key("k"));
        assert_eq!(store.counters.evictions_ttl, 1);
        assert_eq!(store.counters.misses, 1);
    }

    #[test]
    fn test_sweep_expired() {
        let mut store = LocalStore::new(10);
        store.insert("short".to_string(), 1, Duration::from_millis(20));
        store.insert("long".to_string(), 2, HOUR);
        std::thread::sleep(Duration::from_millis(40));

        let event = store.sweep_expired();
        assert_eq!(event.keys, vec!["short".to_string()]);
        assert_eq!(event.reason, InvalidationReason::Expired);
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("long"));
    }

    #[test]
    fn test_clear_resets_counters() {
        let mut store = LocalStore::new(10);
        store.insert("a".to_string(), 1, HOUR);
        store.get("a");
        store.get("b");

        let event = store.clear();
        assert_eq!(event.reason, InvalidationReason::Cleared);
        assert_eq!(event.keys, vec!["a".to_string()]);
        assert_eq!(store.len(), 0);
        assert_eq!(store.counters.hits, 0);
        assert_eq!(store.counters.misses, 0);
    }

    #[test]
    fn test_remove_keeps_lru_index_consistent() {
        let mut store = LocalStore::new(2);
        store.insert("a".to_string(), 1, HOUR);
        store.insert("b".to_string(), 2, HOUR);
        assert!(store.remove("a"));
        assert!(!store.remove("a"));

        store.insert("c".to_string(), 3, HOUR);
        assert_eq!(store.len(), 2);
        assert_eq!(store.insert("d".to_string(), 4, HOUR).as_deref(), Some("b"));
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut store = LocalStore::new(5);
        for i in 0..50 {
            store.insert(format!("k{}", i), i, HOUR);
            assert!(store.len() <= 5);
        }
        assert_eq!(store.counters.evictions_capacity, 45);
        assert!(store.peek("k49").is_some());
    }
}
