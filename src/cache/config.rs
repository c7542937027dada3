//! Configuration for the tiered cache

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for [`TieredCache`](crate::cache::TieredCache)
///
/// Local-tier settings bound memory; remote-tier settings bound the
/// worst-case latency a cache call can add when Redis is slow or gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries held in the local tier
    pub local_max_entries: usize,

    /// Default time-to-live for local entries
    pub local_ttl: Duration,

    /// Default time-to-live for remote entries
    pub remote_ttl: Duration,

    /// Remote tier connection string, e.g. `redis://localhost:6379`.
    /// `None` runs the cache local-only.
    pub remote_url: Option<String>,

    /// Namespace prepended to every remote key
    pub key_prefix: String,

    /// Connection attempts after the first failure
    pub max_retries: u32,

    /// Base delay between connection attempts (doubled per attempt)
    pub retry_backoff: Duration,

    /// Bound on establishing a remote connection
    pub connect_timeout: Duration,

    /// Bound on each remote command
    pub command_timeout: Duration,

    /// Jitter factor (0.0 - 1.0) applied to the default remote TTL
    /// so keys written together do not all expire together
    pub ttl_jitter: f64,

    /// Run the background expiry sweep
    pub enable_auto_cleanup: bool,

    /// Interval between expiry sweeps
    pub cleanup_interval: Duration,

    /// Remote ping slower than this reports `Degraded`
    pub degraded_threshold: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_max_entries: 1_000,
            local_ttl: Duration::from_secs(300),
            remote_ttl: Duration::from_secs(3600),
            remote_url: None,
            key_prefix: "docqa:".to_string(),
            max_retries: 3,
            retry_backoff: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(2),
            command_timeout: Duration::from_millis(500),
            ttl_jitter: 0.1,
            enable_auto_cleanup: true,
            cleanup_interval: Duration::from_secs(60),
            degraded_threshold: Duration::from_millis(100),
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.local_max_entries == 0 {
            return Err(CacheError::ConfigError(
                "local_max_entries must be greater than 0".to_string(),
            ));
        }

        if self.local_ttl.is_zero() {
            return Err(CacheError::ConfigError(
                "local_ttl must be positive".to_string(),
            ));
        }

        if self.remote_ttl.is_zero() {
            return Err(CacheError::ConfigError(
                "remote_ttl must be positive".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(CacheError::ConfigError(
                "ttl_jitter must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.cleanup_interval.is_zero() {
            return Err(CacheError::ConfigError(
                "cleanup_interval must be positive".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() || self.command_timeout.is_zero() {
            return Err(CacheError::ConfigError(
                "remote timeouts must be positive".to_string(),
            ));
        }

        if self.key_prefix.is_empty() {
            return Err(CacheError::ConfigError(
                "key_prefix must not be empty".to_string(),
            ));
        }

        if let Some(url) = &self.remote_url {
            if !(url.starts_with("redis://")
                || url.starts_with("rediss://")
                || url.starts_with("redis+unix://")
                || url.starts_with("unix://"))
            {
                return Err(CacheError::ConfigError(format!(
                    "unsupported remote_url scheme: {}",
                    url
                )));
            }
        }

        Ok(())
    }

    /// Remote TTL with jitter applied, used when a caller omits a TTL
    pub fn remote_ttl_with_jitter(&self) -> Duration {
        if self.ttl_jitter == 0.0 {
            return self.remote_ttl;
        }

        let base_secs = self.remote_ttl.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_secs = (base_secs + jitter).max(1.0);

        Duration::from_secs_f64(final_secs)
    }

    /// Namespaced remote key for a cache key
    pub fn remote_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Load configuration from the process environment (and `.env`, if present)
    ///
    /// `CACHE_ENV` picks the preset (`test`, `development`, `production`);
    /// individual variables override preset values.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("CACHE_ENV").as_deref() {
            None | Some("development") | Some("dev") => Self::development(),
            Some("test") | Some("testing") => Self::testing(),
            Some("production") | Some("prod") => Self::production(),
            Some(other) => {
                return Err(CacheError::ConfigError(format!(
                    "unknown CACHE_ENV: {}",
                    other
                )))
            }
        };

        if let Some(size) = parse_var::<usize>(&lookup, "CACHE_LOCAL_MAX_SIZE")? {
            config.local_max_entries = size;
        }
        if let Some(secs) = parse_positive(&lookup, "CACHE_LOCAL_TTL_SECONDS")? {
            config.local_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_positive(&lookup, "CACHE_REMOTE_TTL_SECONDS")? {
            config.remote_ttl = Duration::from_secs(secs);
        }
        if let Some(url) = lookup("REDIS_URL").filter(|u| !u.trim().is_empty()) {
            config.remote_url = Some(url.trim().to_string());
        }
        if let Some(prefix) = lookup("CACHE_KEY_PREFIX") {
            config.key_prefix = prefix;
        }
        if let Some(retries) = parse_var::<u32>(&lookup, "REDIS_MAX_RETRIES")? {
            config.max_retries = retries;
        }
        if let Some(ms) = parse_positive(&lookup, "REDIS_RETRY_BACKOFF_MS")? {
            config.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_positive(&lookup, "REDIS_CONNECT_TIMEOUT_MS")? {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_positive(&lookup, "REDIS_COMMAND_TIMEOUT_MS")? {
            config.command_timeout = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            CacheError::ConfigError(format!("{} has invalid value: {}", name, raw))
        }),
    }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<u64>> {
    let value = lookup(name);
    let Some(raw) = value else {
        return Ok(None);
    };
    match raw.trim().parse::<i64>() {
        Ok(v) if v > 0 => Ok(Some(v as u64)),
        Ok(v) => Err(CacheError::ConfigError(format!(
            "{} must be positive, got {}",
            name, v
        ))),
        Err(_) => Err(CacheError::ConfigError(format!(
            "{} has invalid value: {}",
            name, raw
        ))),
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    local_max_entries: Option<usize>,
    local_ttl: Option<Duration>,
    remote_ttl: Option<Duration>,
    remote_url: Option<String>,
    key_prefix: Option<String>,
    max_retries: Option<u32>,
    retry_backoff: Option<Duration>,
    connect_timeout: Option<Duration>,
    command_timeout: Option<Duration>,
    ttl_jitter: Option<f64>,
    enable_auto_cleanup: Option<bool>,
    cleanup_interval: Option<Duration>,
    degraded_threshold: Option<Duration>,
}

impl CacheConfigBuilder {
    /// Set maximum number of local entries
    pub fn local_max_entries(mut self, max: usize) -> Self {
        self.local_max_entries = Some(max);
        self
    }

    /// Set default TTL for local entries
    pub fn local_ttl(mut self, ttl: Duration) -> Self {
        self.local_ttl = Some(ttl);
        self
    }

    /// Set default TTL for remote entries
    pub fn remote_ttl(mut self, ttl: Duration) -> Self {
        self.remote_ttl = Some(ttl);
        self
    }

    /// Set the remote tier connection string
    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    /// Set the remote key namespace
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Set connection retry attempts
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set base backoff between connection attempts
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = Some(backoff);
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set per-command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    /// Enable or disable the background sweep
    pub fn enable_auto_cleanup(mut self, enable: bool) -> Self {
        self.enable_auto_cleanup = Some(enable);
        self
    }

    /// Set sweep interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Set the ping latency above which the remote tier is `Degraded`
    pub fn degraded_threshold(mut self, threshold: Duration) -> Self {
        self.degraded_threshold = Some(threshold);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            local_max_entries: self.local_max_entries.unwrap_or(defaults.local_max_entries),
            local_ttl: self.local_ttl.unwrap_or(defaults.local_ttl),
            remote_ttl: self.remote_ttl.unwrap_or(defaults.remote_ttl),
            remote_url: self.remote_url.or(defaults.remote_url),
            key_prefix: self.key_prefix.unwrap_or(defaults.key_prefix),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff: self.retry_backoff.unwrap_or(defaults.retry_backoff),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            command_timeout: self.command_timeout.unwrap_or(defaults.command_timeout),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            enable_auto_cleanup: self
                .enable_auto_cleanup
                .unwrap_or(defaults.enable_auto_cleanup),
            cleanup_interval: self.cleanup_interval.unwrap_or(defaults.cleanup_interval),
            degraded_threshold: self
                .degraded_threshold
                .unwrap_or(defaults.degraded_threshold),
        }
    }
}

/// Preset configurations per environment
impl CacheConfig {
    /// Small and short-lived; fast sweeps so tests observe expiry quickly
    pub fn testing() -> Self {
        Self {
            local_max_entries: 100,
            local_ttl: Duration::from_secs(60),
            remote_ttl: Duration::from_secs(120),
            key_prefix: "docqa:test:".to_string(),
            max_retries: 0,
            connect_timeout: Duration::from_millis(500),
            command_timeout: Duration::from_millis(200),
            ttl_jitter: 0.0,
            cleanup_interval: Duration::from_secs(1),
            ..Default::default()
        }
    }

    /// Local development defaults
    pub fn development() -> Self {
        Self::default()
    }

    /// Larger local tier and longer-lived remote entries
    pub fn production() -> Self {
        Self {
            local_max_entries: 10_000,
            local_ttl: Duration::from_secs(900),
            remote_ttl: Duration::from_secs(24 * 3600),
            max_retries: 5,
            retry_backoff: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(1),
            cleanup_interval: Duration::from_secs(300),
            degraded_threshold: Duration::from_millis(250),
            ..Default::default()
        }
    }
}
