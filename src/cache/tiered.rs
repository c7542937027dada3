//! Two-tier read-through/write-through cache
//!
//! Tier 1 is the in-process [`LocalStore`]; tier 2 is an optional
//! [`RemoteStore`]. Remote failures of any kind degrade the current
//! operation to local-only behaviour and are logged, never returned.

use crate::cache::{
    config::CacheConfig,
    invalidation::{InvalidationEvent, InvalidationReason},
    remote::{RedisStore, RemoteStore},
    store::{LocalStore, Lookup},
    types::{CacheHealth, CacheKey, CacheMetrics, HealthStatus, TierHealth, TierMetrics},
};
use crate::error::{CacheError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Running counters for the remote tier
#[derive(Debug, Default)]
struct RemoteCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl RemoteCounters {
    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }
}

/// Handle to the background expiry sweep
struct Sweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Generic two-tier cache
///
/// Values are held as `V` in the local tier and as JSON in the remote tier.
/// The instance owns its sweep task; call [`disconnect`](Self::disconnect)
/// for deterministic teardown.
pub struct TieredCache<V> {
    config: CacheConfig,
    local: Arc<RwLock<LocalStore<V>>>,
    remote: Option<Arc<dyn RemoteStore>>,
    remote_counters: RemoteCounters,
    sweeper: std::sync::Mutex<Option<Sweeper>>,
    disconnected: AtomicBool,
}

impl<V> TieredCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a cache from configuration, connecting to Redis when
    /// `remote_url` is set
    ///
    /// An unreachable Redis is not an error: the cache starts local-only for
    /// now and the remote store keeps trying to connect on later calls.
    pub async fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let remote: Option<Arc<dyn RemoteStore>> = match &config.remote_url {
            Some(url) => {
                let store = RedisStore::new(url, &config)?;
                if let Err(e) = store.connect_with_retry().await {
                    warn!(
                        "Remote cache tier unavailable at startup, serving local tier only: {}",
                        e
                    );
                }
                Some(Arc::new(store))
            }
            None => None,
        };

        Ok(Self::build(config, remote))
    }

    /// Create a cache over an already constructed remote store
    pub fn with_remote(config: CacheConfig, remote: Arc<dyn RemoteStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, Some(remote)))
    }

    /// Create a cache with no remote tier
    pub fn local_only(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, None))
    }

    fn build(config: CacheConfig, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        info!(
            "Initializing tiered cache (local capacity: {}, remote: {})",
            config.local_max_entries,
            if remote.is_some() { "enabled" } else { "disabled" }
        );

        let local = Arc::new(RwLock::new(LocalStore::new(config.local_max_entries)));

        let sweeper = if config.enable_auto_cleanup {
            Some(spawn_sweeper(local.clone(), config.cleanup_interval))
        } else {
            None
        };

        Self {
            config,
            local,
            remote,
            remote_counters: RemoteCounters::default(),
            sweeper: std::sync::Mutex::new(sweeper),
            disconnected: AtomicBool::new(false),
        }
    }

    /// Look a key up in the local tier, then the remote tier
    pub async fn get(&self, key: &str) -> Option<V> {
        {
            let mut local = self.local.write().await;
            if let Lookup::Hit(value) = local.get(key) {
                debug!("Local tier hit: {}", key);
                return Some(value);
            }
        }

        let remote = self.active_remote()?;
        let remote_key = self.config.remote_key(key);

        let payload = match self.remote_call("GET", key, remote.get(&remote_key)).await {
            Some(Some(payload)) => payload,
            Some(None) => {
                debug!("Remote tier miss: {}", key);
                self.remote_counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            None => {
                self.remote_counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match serde_json::from_str::<V>(&payload) {
            Ok(value) => {
                debug!("Remote tier hit: {}", key);
                self.remote_counters.hits.fetch_add(1, Ordering::Relaxed);
                let mut local = self.local.write().await;
                local.insert(key.to_string(), value.clone(), self.config.local_ttl);
                Some(value)
            }
            Err(e) => {
                let err = CacheError::ValidationError(format!("undecodable payload: {}", e));
                warn!("Remote entry {} ({}): {}", key, InvalidationReason::Corrupt, err);
                self.remote_counters.misses.fetch_add(1, Ordering::Relaxed);
                self.remote_call("DEL", key, remote.delete(&remote_key)).await;
                None
            }
        }
    }

    /// Store a value in both tiers
    ///
    /// `ttl` overrides the configured defaults for both tiers. Only a
    /// serialization failure is returned; the cache is untouched in that case.
    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        let payload = serde_json::to_string(&value).map_err(|e| {
            CacheError::SerializationError(format!("cannot serialize value for {}: {}", key, e))
        })?;

        {
            let mut local = self.local.write().await;
            let local_ttl = ttl.unwrap_or(self.config.local_ttl);
            if let Some(evicted) = local.insert(key.to_string(), value, local_ttl) {
                debug!("Inserted {} (evicted {})", key, evicted);
            }
        }

        if let Some(remote) = self.active_remote() {
            let remote_ttl = ttl.unwrap_or_else(|| self.config.remote_ttl_with_jitter());
            let remote_key = self.config.remote_key(key);
            self.remote_call(
                "SET",
                key,
                remote.set_with_expiry(&remote_key, &payload, remote_ttl),
            )
            .await;
        }

        Ok(())
    }

    /// Remove a key from both tiers
    pub async fn delete(&self, key: &str) -> Result<()> {
        let removed = self.local.write().await.remove(key);
        if removed {
            debug!("Local entry {}: {}", InvalidationReason::Deleted, key);
        }

        if let Some(remote) = self.active_remote() {
            let remote_key = self.config.remote_key(key);
            self.remote_call("DEL", key, remote.delete(&remote_key)).await;
        }

        Ok(())
    }

    /// Clear the local tier and reset metrics
    ///
    /// The remote tier is left alone; use
    /// [`purge_remote_namespace`](Self::purge_remote_namespace) to wipe it.
    pub async fn clear(&self) -> Result<()> {
        let event = self.local.write().await.clear();
        self.remote_counters.reset();
        info!("{}", event);
        Ok(())
    }

    /// Current metrics for both tiers
    pub async fn metrics(&self) -> CacheMetrics {
        let local = self.local.read().await;
        let counters = &local.counters;

        CacheMetrics {
            local: TierMetrics::from_counts(counters.hits, counters.misses, Some(local.len())),
            remote: TierMetrics::from_counts(
                self.remote_counters.hits.load(Ordering::Relaxed),
                self.remote_counters.misses.load(Ordering::Relaxed),
                None,
            ),
            evictions_capacity: counters.evictions_capacity,
            evictions_ttl: counters.evictions_ttl,
            remote_errors: self.remote_counters.errors.load(Ordering::Relaxed),
        }
    }

    /// Health of both tiers; the remote tier is checked with PING
    pub async fn health_check(&self) -> CacheHealth {
        let local = TierHealth::new(HealthStatus::Healthy, 0, None);

        let Some(remote) = self.active_remote() else {
            let status = if self.remote.is_some() {
                HealthStatus::Down
            } else {
                HealthStatus::Disabled
            };
            let error = self
                .remote
                .as_ref()
                .map(|_| "remote tier disconnected".to_string());
            return CacheHealth {
                local,
                remote: TierHealth::new(status, 0, error),
            };
        };

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.config.command_timeout, remote.ping()).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let remote_health = match outcome {
            Ok(Ok(())) => {
                let status = if elapsed_ms > self.config.degraded_threshold.as_millis() as u64 {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                };
                debug!("Remote tier ping: {:?} ({}ms)", status, elapsed_ms);
                TierHealth::new(status, elapsed_ms, None)
            }
            Ok(Err(e)) => {
                warn!("Remote tier health check failed: {}", e);
                TierHealth::new(HealthStatus::Down, elapsed_ms, Some(e.to_string()))
            }
            Err(_) => {
                warn!(
                    "Remote tier health check timed out after {:?}",
                    self.config.command_timeout
                );
                TierHealth::new(
                    HealthStatus::Down,
                    elapsed_ms,
                    Some(format!(
                        "ping timed out after {}ms",
                        self.config.command_timeout.as_millis()
                    )),
                )
            }
        };

        CacheHealth {
            local,
            remote: remote_health,
        }
    }

    /// Stop the sweep task and release the remote connection
    ///
    /// Idempotent. The local tier keeps serving afterwards.
    pub async fn disconnect(&self) {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(sweeper) = sweeper {
            let _ = sweeper.shutdown.send(true);
            if let Err(e) = sweeper.handle.await {
                warn!("Cache sweep task ended abnormally: {}", e);
            }
            debug!("Cache sweep task stopped");
        }

        if !self.disconnected.swap(true, Ordering::AcqRel) {
            if let Some(remote) = &self.remote {
                remote.close().await;
            }
            info!("Tiered cache disconnected");
        }
    }

    /// Remove expired local entries now instead of waiting for the sweep
    pub async fn sweep_expired(&self) -> InvalidationEvent {
        self.local.write().await.sweep_expired()
    }

    /// Remote keys under this cache's namespace matching `pattern`,
    /// with the namespace stripped
    pub async fn remote_keys(&self, pattern: &str) -> Vec<CacheKey> {
        let Some(remote) = self.active_remote() else {
            return Vec::new();
        };

        let full_pattern = self.config.remote_key(pattern);
        let prefix = &self.config.key_prefix;
        self.remote_call("KEYS", pattern, remote.keys(&full_pattern))
            .await
            .unwrap_or_default()
            .into_iter()
            .filter_map(|k| k.strip_prefix(prefix.as_str()).map(str::to_string))
            .collect()
    }

    /// Delete every remote key under this cache's namespace
    pub async fn purge_remote_namespace(&self) -> usize {
        let Some(remote) = self.active_remote() else {
            return 0;
        };

        let keys = self.remote_keys("*").await;
        let mut purged = 0;
        for key in keys {
            let remote_key = self.config.remote_key(&key);
            if self
                .remote_call("DEL", &key, remote.delete(&remote_key))
                .await
                .is_some()
            {
                purged += 1;
            }
        }

        info!(
            "Purged {} remote keys under namespace {}",
            purged, self.config.key_prefix
        );
        purged
    }

    /// Whether the local tier currently holds `key` (expired or not)
    pub async fn contains_local(&self, key: &str) -> bool {
        self.local.read().await.contains_key(key)
    }

    /// Remaining local TTL for `key`
    pub async fn local_ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.local
            .read()
            .await
            .peek(key)
            .and_then(|entry| entry.time_until_expiration())
    }

    /// Number of entries in the local tier
    pub async fn len(&self) -> usize {
        self.local.read().await.len()
    }

    /// Check if the local tier is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether a remote tier is configured and not disconnected
    pub fn has_remote(&self) -> bool {
        self.active_remote().is_some()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn active_remote(&self) -> Option<&Arc<dyn RemoteStore>> {
        if self.disconnected.load(Ordering::Acquire) {
            return None;
        }
        self.remote.as_ref()
    }

    /// Run a remote operation under the command timeout
    ///
    /// Returns `None` when the operation failed or timed out; the failure is
    /// logged and counted.
    async fn remote_call<T, F>(&self, op: &str, key: &str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.command_timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("Remote {} failed for {}, degrading to local tier: {}", op, key, e);
                self.remote_counters.errors.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(_) => {
                let err = CacheError::RemoteTimeoutError {
                    timeout_ms: self.config.command_timeout.as_millis() as u64,
                    context: format!("{} {}", op, key),
                };
                warn!("{}; degrading to local tier", err);
                self.remote_counters.errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }
}

impl<V> Drop for TieredCache<V> {
    fn drop(&mut self) {
        let sweeper = self
            .sweeper
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(sweeper) = sweeper {
            sweeper.handle.abort();
        }
    }
}

fn spawn_sweeper<V>(local: Arc<RwLock<LocalStore<V>>>, interval: Duration) -> Sweeper
where
    V: Clone + Send + Sync + 'static,
{
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    info!("Starting cache sweep task (interval: {:?})", interval);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let event = local.write().await.sweep_expired();
                    if !event.is_empty() {
                        debug!("Sweep: {}", event);
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });

    Sweeper { shutdown, handle }
}
