//! cachebay - pluggable cache adapters selected by name.
//!
//! Every backend implements the [`Cache`] trait. An [`AdapterRegistry`]
//! maps backend names to factories, so configuration alone decides which
//! store an application talks to.
//!
//! # Example
//!
//! ```rust,no_run
//! use cachebay::{AdapterRegistry, Cache};
//! use std::time::Duration;
//!
//! fn main() -> cachebay::Result<()> {
//!     let registry = AdapterRegistry::with_builtin_adapters();
//!     let cache = registry.new_cache("redis", r#"{"conn":"127.0.0.1:6379"}"#)?;
//!
//!     cache.put("greeting", b"hello", Duration::from_secs(60))?;
//!     assert_eq!(cache.get("greeting"), Some(b"hello".to_vec()));
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use cache::{
    AdapterFactory, AdapterRegistry, Cache, MemoryCache, RedisCache, SqliteCache, FILE_ADAPTER,
    MEMORY_ADAPTER, REDIS_ADAPTER,
};
pub use config::{ConfigPayload, FileConfig, MemoryConfig, RedisConfig};
pub use error::{CacheError, Result};
