//! Error types for cache and context operations
//!
//! Only serialization and configuration failures are surfaced to callers.
//! Remote-tier and validation errors exist so the degraded paths can log
//! and count them precisely before falling back to the local tier.

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be serialized for storage
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Remote tier unreachable or connection dropped
    #[error("Remote tier connection error: {0}")]
    RemoteConnectionError(String),

    /// Remote tier operation exceeded its configured timeout
    #[error("Remote tier operation timed out after {timeout_ms}ms: {context}")]
    RemoteTimeoutError { timeout_ms: u64, context: String },

    /// Remote tier answered with something unexpected
    #[error("Remote tier protocol error: {0}")]
    RemoteProtocolError(String),

    /// Malformed cached payload or request
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid tuning parameters
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Discriminant for [`CacheError`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Serialization,
    RemoteTier,
    Validation,
    Configuration,
}

impl CacheError {
    /// Coarse category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::SerializationError(_) => ErrorKind::Serialization,
            CacheError::RemoteConnectionError(_)
            | CacheError::RemoteTimeoutError { .. }
            | CacheError::RemoteProtocolError(_) => ErrorKind::RemoteTier,
            CacheError::ValidationError(_) => ErrorKind::Validation,
            CacheError::ConfigError(_) => ErrorKind::Configuration,
        }
    }

    /// Whether this error is ever returned to a caller instead of degraded locally
    pub fn is_caller_visible(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Serialization | ErrorKind::Configuration
        )
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        // driver timeouts carry no duration; RemoteTimeoutError is reserved
        // for the command timeout wrapper, which knows it
        if e.is_timeout() {
            CacheError::RemoteConnectionError(format!("timed out: {}", e))
        } else if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            CacheError::RemoteConnectionError(e.to_string())
        } else {
            CacheError::RemoteProtocolError(e.to_string())
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::SerializationError(e.to_string())
    }
}
