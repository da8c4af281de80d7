//! Cache capability trait, adapters and the registry that selects them.
//!
//! Bundled adapters:
//! - `redis`: Redis over a single shared connection
//! - `memory`: bounded in-process map
//! - `file`: SQLite database on disk

mod memory;
mod redis;
mod registry;
mod sqlite;
mod traits;

pub use memory::{MemoryCache, MEMORY_ADAPTER};
pub use self::redis::{RedisCache, REDIS_ADAPTER};
pub use registry::{AdapterFactory, AdapterRegistry};
pub use sqlite::{SqliteCache, FILE_ADAPTER};
pub use traits::Cache;
