//! Remote cache tier
//!
//! The remote tier is any key/value store speaking GET, SET-with-expiry, DEL,
//! PING and KEYS. [`RedisStore`] is the production backend; [`MemoryStore`]
//! keeps the same contract in-process for tests and single-node setups.
//!
//! Callers see raw errors here; [`TieredCache`](crate::cache::TieredCache) is
//! responsible for timeouts and for degrading to the local tier.

use crate::cache::config::CacheConfig;
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use glob::Pattern;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Upper bound on a single reconnect delay
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Key/value operations the tiered cache needs from a remote store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a raw payload
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a raw payload that expires after `ttl`
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Remove a key; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Round-trip check
    async fn ping(&self) -> Result<()>;

    /// Keys matching a glob-style pattern
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Release connections; later calls fail with a connection error
    async fn close(&self) {}
}

/// Redis-backed remote tier
///
/// Connects lazily and reconnects through redis' `ConnectionManager`, so a
/// Redis that is down at startup is picked up once it becomes reachable.
pub struct RedisStore {
    client: Client,
    connection: RwLock<Option<ConnectionManager>>,
    /// Serializes connection attempts so concurrent callers do not stampede
    connect_lock: Mutex<()>,
    connect_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    closed: std::sync::atomic::AtomicBool,
}

impl RedisStore {
    /// Create a store for `url` without touching the network
    pub fn new(url: &str, config: &CacheConfig) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| CacheError::ConfigError(format!("invalid remote_url: {}", e)))?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            connect_lock: Mutex::new(()),
            connect_timeout: config.connect_timeout,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
            closed: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Establish the connection, retrying with exponential backoff
    pub async fn connect_with_retry(&self) -> Result<()> {
        let mut attempt = 0;

        loop {
            match self.connection().await {
                Ok(_) => return Ok(()),
                Err(e) if attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    let delay = retry_delay(self.retry_backoff, attempt);
                    attempt += 1;
                    warn!(
                        "Remote tier connection failed (attempt {}/{}), retrying after {:?}: {}",
                        attempt,
                        self.max_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        if self.closed.load(std::sync::atomic::Ordering::Acquire) {
            return Err(CacheError::RemoteConnectionError(
                "remote store closed".to_string(),
            ));
        }

        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let _guard = self.connect_lock.lock().await;
        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        debug!("Opening remote tier connection");
        let conn = tokio::time::timeout(
            self.connect_timeout,
            ConnectionManager::new(self.client.clone()),
        )
        .await
        .map_err(|_| CacheError::RemoteTimeoutError {
            timeout_ms: self.connect_timeout.as_millis() as u64,
            context: "connect".to_string(),
        })??;

        info!("Connected to remote cache tier");
        *self.connection.write().await = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        let ttl_ms = (ttl.as_millis() as u64).max(1);
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(CacheError::RemoteProtocolError(format!(
                "unexpected PING reply: {}",
                pong
            )));
        }
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
        Ok(keys)
    }

    async fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::Release);
        if self.connection.write().await.take().is_some() {
            info!("Released remote cache tier connection");
        }
    }
}

/// Exponential backoff capped at [`MAX_RETRY_DELAY`]
fn retry_delay(backoff: Duration, attempt: u32) -> Duration {
    backoff
        .checked_mul(2u32.saturating_pow(attempt))
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

/// In-process remote tier with expiry
///
/// Entries live as long as the store; useful for tests and for running a
/// single node without Redis while keeping two-tier behaviour.
#[derive(Default)]
pub struct MemoryStore {
    entries: std::sync::Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|(_, exp)| *exp > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite a key with an arbitrary payload, bypassing serialization
    pub fn insert_raw(&self, key: &str, value: &str, ttl: Duration) {
        self.lock()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>> {
        // a poisoned map still holds consistent (String, Instant) pairs
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.insert_raw(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = Pattern::new(pattern).map_err(|e| {
            CacheError::ValidationError(format!("invalid key pattern {:?}: {}", pattern, e))
        })?;

        let now = Instant::now();
        let mut keys: Vec<String> = self
            .lock()
            .iter()
            .filter(|(key, (_, expires_at))| *expires_at > now && matcher.matches(key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_is_capped() {
        let backoff = Duration::from_millis(200);
        assert_eq!(retry_delay(backoff, 0), Duration::from_millis(200));
        assert_eq!(retry_delay(backoff, 3), Duration::from_millis(1600));
        assert_eq!(retry_delay(backoff, 10), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(backoff, u32::MAX), MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        store
            .set_with_expiry("k", "v", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_expiry() {
        let store = MemoryStore::new();
        store
            .set_with_expiry("k", "v", Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_keys() {
        let store = MemoryStore::new();
        for key in ["docqa:a1", "docqa:b1", "docqa:c1", "other:a1"] {
            store
                .set_with_expiry(key, "v", Duration::from_secs(60))
                .await
                .unwrap();
        }

        let keys = store.keys("docqa:*").await.unwrap();
        assert_eq!(keys.len(), 3);

        let keys = store.keys("docqa:[ab]1").await.unwrap();
        assert_eq!(keys, vec!["docqa:a1".to_string(), "docqa:b1".to_string()]);

        let keys = store.keys("*:a?").await.unwrap();
        assert_eq!(keys, vec!["docqa:a1".to_string(), "other:a1".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_store_rejects_bad_pattern() {
        let store = MemoryStore::new();
        let err = store.keys("docqa:[a").await.unwrap_err();
        assert!(matches!(err, CacheError::ValidationError(_)));
    }

    #[test]
    fn test_redis_store_rejects_bad_url() {
        let config = CacheConfig::default();
        let result = RedisStore::new("not a url", &config);
        assert!(matches!(result, Err(CacheError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_redis_store_unreachable() {
        let config = CacheConfig::builder()
            .connect_timeout(Duration::from_millis(300))
            .max_retries(1)
            .retry_backoff(Duration::from_millis(10))
            .build();
        // port 1 is reserved and refuses connections
        let store = RedisStore::new("redis://127.0.0.1:1", &config).unwrap();

        let err = store.connect_with_retry().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::RemoteTier);
        assert!(store.get("k").await.is_err());
    }

    #[tokio::test]
    async fn test_redis_store_closed() {
        let store = RedisStore::new("redis://127.0.0.1:1", &CacheConfig::default()).unwrap();
        store.close().await;

        let err = store.ping().await.unwrap_err();
        assert!(matches!(err, CacheError::RemoteConnectionError(_)));
    }
}
