//! Adapter registry.
//!
//! Maps adapter names to factories that build unstarted [`Cache`]
//! instances. The registry is an ordinary value owned by application
//! startup code: register every backend once, then resolve caches by name.

use super::memory::{MemoryCache, MEMORY_ADAPTER};
use super::redis::{RedisCache, REDIS_ADAPTER};
use super::sqlite::{SqliteCache, FILE_ADAPTER};
use super::traits::Cache;
use crate::error::{CacheError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Builds a fresh, unstarted adapter.
pub type AdapterFactory = Arc<dyn Fn() -> Box<dyn Cache> + Send + Sync>;

/// Name → factory mapping used to create caches.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: Arc<RwLock<HashMap<String, AdapterFactory>>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the bundled `redis`, `memory` and `file`
    /// adapters registered.
    pub fn with_builtin_adapters() -> Self {
        let registry = Self::new();
        registry.register(REDIS_ADAPTER, RedisCache::boxed);
        registry.register(MEMORY_ADAPTER, MemoryCache::boxed);
        registry.register(FILE_ADAPTER, SqliteCache::boxed);
        registry
    }

    /// Install `factory` under `name`.
    ///
    /// An existing registration under the same name is replaced; the last
    /// registration wins.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Cache> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut factories = match self.factories.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if factories.insert(name.clone(), Arc::new(factory)).is_some() {
            debug!("Replaced cache adapter registration '{}'", name);
        } else {
            debug!("Registered cache adapter '{}'", name);
        }
    }

    /// Whether an adapter is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .map(|factories| factories.contains_key(name))
            .unwrap_or(false)
    }

    /// Registered adapter names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .map(|factories| factories.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Build the adapter registered as `name` and start it with `config`.
    ///
    /// Fails with [`CacheError::UnknownAdapter`] when nothing is registered
    /// under `name`. If starting fails the instance is dropped and the
    /// start error is returned unchanged.
    pub fn new_cache(&self, name: &str, config: &str) -> Result<Box<dyn Cache>> {
        let factory = self.factory(name)?;
        let mut cache = factory();

        if let Err(e) = cache.start_and_gc(config) {
            warn!("Failed to start cache adapter '{}': {}", name, e);
            return Err(e);
        }

        debug!("Started cache adapter '{}'", name);
        Ok(cache)
    }

    fn factory(&self, name: &str) -> Result<AdapterFactory> {
        let factories = self
            .factories
            .read()
            .map_err(|e| CacheError::Other(format!("Failed to acquire registry lock: {}", e)))?;

        factories
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownAdapter {
                name: name.to_string(),
            })
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.names())
            .finish()
    }
}
