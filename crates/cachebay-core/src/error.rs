//! Error types for cachebay.
//!
//! Every adapter reports failures through [`CacheError`]. Configuration
//! problems, registry lookups and backend failures each get their own
//! variant so callers can decide what to do without string matching.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cache adapters and the registry.
#[derive(Debug, Error)]
pub enum CacheError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Registry errors
    #[error("Unknown cache adapter: {name}")]
    UnknownAdapter { name: String },

    // Lifecycle errors
    #[error("Cache adapter '{adapter}' has not been started")]
    NotStarted { adapter: &'static str },

    #[error("Cache adapter '{adapter}' is already started")]
    AlreadyStarted { adapter: &'static str },

    // Backend errors
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<redis::RedisError>,
    },

    #[error("Backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<redis::RedisError>,
    },

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Value at '{key}' is not an integer")]
    NotNumeric { key: String },

    #[error("Counter at '{key}' would overflow")]
    Overflow { key: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            CacheError::Connection {
                message: err.to_string(),
                source: Some(err),
            }
        } else {
            CacheError::Backend {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl CacheError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        CacheError::Config {
            message: message.into(),
        }
    }

    /// Whether this error came from a missing or invalid option.
    pub fn is_config_error(&self) -> bool {
        matches!(self, CacheError::Config { .. } | CacheError::Json { .. })
    }

    /// Check if this error could succeed on a later attempt.
    ///
    /// Adapters never retry on their own; this lets callers build a policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Connection { .. })
    }
}
