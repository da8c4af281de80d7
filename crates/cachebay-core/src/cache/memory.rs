//! In-process cache adapter.
//!
//! Entries live in a `mini_moka` cache, unbounded unless a `capacity` is
//! configured. The TTL is tracked per entry and checked on read, so expired
//! entries disappear lazily. Writes take a small mutex so that `incr`/`decr`
//! are atomic with respect to every other mutation.
//!
//! With a `capacity`, mini-moka may evict any entry once the bound is
//! reached, including ones stored without a TTL.

use super::traits::{parse_counter, Cache};
use crate::config::{ConfigPayload, MemoryConfig};
use crate::error::{CacheError, Result};
use mini_moka::sync::Cache as MokaCache;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Registry name of the memory adapter.
pub const MEMORY_ADAPTER: &str = "memory";

#[derive(Clone)]
struct Entry {
    value: Arc<[u8]>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: &[u8], ttl: Duration) -> Self {
        Self {
            value: Arc::from(value),
            // An expiry past the clock's range never fires.
            expires_at: if ttl.is_zero() {
                None
            } else {
                Instant::now().checked_add(ttl)
            },
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

struct Store {
    entries: MokaCache<String, Entry>,
    write_lock: Mutex<()>,
    config: MemoryConfig,
}

/// Memory-backed cache, private to one process.
pub struct MemoryCache {
    store: Option<Store>,
}

impl MemoryCache {
    /// Create an unstarted adapter.
    pub fn new() -> Self {
        Self { store: None }
    }

    /// Create a started adapter directly from typed settings.
    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            store: Some(Store::new(config)),
        }
    }

    /// Factory used by the registry.
    pub fn boxed() -> Box<dyn Cache> {
        Box::new(Self::new())
    }

    /// Settings in effect, once started.
    pub fn config(&self) -> Option<&MemoryConfig> {
        self.store.as_ref().map(|s| &s.config)
    }

    fn store(&self) -> Result<&Store> {
        self.store.as_ref().ok_or(CacheError::NotStarted {
            adapter: MEMORY_ADAPTER,
        })
    }

    fn adjust(&self, key: &str, delta: i64) -> Result<i64> {
        let store = self.store()?;
        let _guard = store.lock()?;

        let (current, expires_at) = match store.peek(key) {
            Some(entry) => {
                let current = parse_counter(&entry.value).ok_or_else(|| CacheError::NotNumeric {
                    key: key.to_string(),
                })?;
                (current, entry.expires_at)
            }
            None => (0, None),
        };

        let next = current
            .checked_add(delta)
            .ok_or_else(|| CacheError::Overflow {
                key: key.to_string(),
            })?;

        store.entries.insert(
            key.to_string(),
            Entry {
                value: Arc::from(next.to_string().as_bytes()),
                expires_at,
            },
        );
        Ok(next)
    }
}

impl Store {
    fn new(config: MemoryConfig) -> Self {
        Self {
            entries: match config.capacity {
                Some(capacity) => MokaCache::builder().max_capacity(capacity).build(),
                None => MokaCache::builder().build(),
            },
            write_lock: Mutex::new(()),
            config,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| CacheError::Other(format!("Failed to lock memory cache: {}", e)))
    }

    /// Fetch an unexpired entry without touching the map.
    fn peek(&self, key: &str) -> Option<Entry> {
        self.entries
            .get(&key.to_string())
            .filter(|entry| entry.is_live(Instant::now()))
    }

    /// Fetch an unexpired entry, dropping it if it has expired.
    ///
    /// The drop happens under the write lock and only if the entry is still
    /// expired, so a value written after the first read is never removed.
    fn live(&self, key: &str) -> Result<Option<Entry>> {
        let key = key.to_string();
        match self.entries.get(&key) {
            None => return Ok(None),
            Some(entry) if entry.is_live(Instant::now()) => return Ok(Some(entry)),
            Some(_) => {}
        }

        let _guard = self.lock()?;
        match self.entries.get(&key) {
            Some(entry) if entry.is_live(Instant::now()) => Ok(Some(entry)),
            Some(_) => {
                self.entries.invalidate(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for MemoryCache {
    fn name(&self) -> &'static str {
        MEMORY_ADAPTER
    }

    fn start_and_gc(&mut self, config: &str) -> Result<()> {
        if self.store.is_some() {
            return Err(CacheError::AlreadyStarted {
                adapter: MEMORY_ADAPTER,
            });
        }

        let payload = ConfigPayload::parse(config)?;
        let config = MemoryConfig::from_payload(&payload)?;
        match config.capacity {
            Some(capacity) => debug!("Memory cache started with capacity {}", capacity),
            None => debug!("Memory cache started without a capacity bound"),
        }

        self.store = Some(Store::new(config));
        Ok(())
    }

    fn try_get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.store()?.live(key)?.map(|e| e.value.to_vec()))
    }

    fn try_get_multi(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        let store = self.store()?;
        keys.iter()
            .map(|key| {
                store
                    .live(key)
                    .map(|entry| entry.map(|e| e.value.to_vec()))
            })
            .collect()
    }

    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let store = self.store()?;
        let _guard = store.lock()?;
        store.entries.insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let store = self.store()?;
        let _guard = store.lock()?;
        store.entries.invalidate(&key.to_string());
        Ok(())
    }

    fn try_is_exist(&self, key: &str) -> Result<bool> {
        Ok(self.store()?.live(key)?.is_some())
    }

    fn incr(&self, key: &str) -> Result<i64> {
        self.adjust(key, 1)
    }

    fn decr(&self, key: &str) -> Result<i64> {
        self.adjust(key, -1)
    }

    fn clear_all(&self) -> Result<()> {
        let store = self.store()?;
        let _guard = store.lock()?;
        let keys: Vec<String> = store.entries.iter().map(|e| e.key().clone()).collect();
        for key in &keys {
            store.entries.invalidate(key);
        }
        debug!("Cleared {} entries from memory cache", keys.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn started() -> MemoryCache {
        let mut cache = MemoryCache::new();
        cache.start_and_gc("").unwrap();
        cache
    }

    #[test]
    fn test_put_and_get() {
        let cache = started();
        cache.put("greeting", b"hello", Duration::ZERO).unwrap();

        assert_eq!(cache.get("greeting"), Some(b"hello".to_vec()));
        assert!(cache.is_exist("greeting"));
        assert!(cache.get("missing").is_none());
        assert!(!cache.is_exist("missing"));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = started();
        cache
            .put("short", b"lived", Duration::from_millis(30))
            .unwrap();
        assert!(cache.is_exist("short"));

        thread::sleep(Duration::from_millis(80));
        assert!(cache.get("short").is_none());
        assert!(!cache.is_exist("short"));
    }

    #[test]
    fn test_incr_preserves_ttl() {
        let cache = started();
        cache.put("hits", b"1", Duration::from_millis(30)).unwrap();
        assert_eq!(cache.incr("hits").unwrap(), 2);

        thread::sleep(Duration::from_millis(80));
        assert!(cache.get("hits").is_none());
    }

    #[test]
    fn test_incr_decr() {
        let cache = started();
        assert_eq!(cache.incr("counter").unwrap(), 1);
        assert_eq!(cache.incr("counter").unwrap(), 2);
        assert_eq!(cache.decr("counter").unwrap(), 1);
        assert_eq!(cache.decr("fresh").unwrap(), -1);
    }

    #[test]
    fn test_incr_non_numeric_leaves_value() {
        let cache = started();
        cache.put("name", b"alice", Duration::ZERO).unwrap();

        let err = cache.incr("name").unwrap_err();
        assert!(matches!(err, CacheError::NotNumeric { .. }));
        assert_eq!(cache.get("name"), Some(b"alice".to_vec()));
    }

    #[test]
    fn test_incr_overflow() {
        let cache = started();
        cache
            .put("max", i64::MAX.to_string().as_bytes(), Duration::ZERO)
            .unwrap();
        assert!(matches!(
            cache.incr("max"),
            Err(CacheError::Overflow { .. })
        ));
        assert_eq!(cache.get("max"), Some(i64::MAX.to_string().into_bytes()));
    }

    #[test]
    fn test_concurrent_incr() {
        let cache = Arc::new(started());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..100 {
                        cache.incr("shared").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.get("shared"), Some(b"800".to_vec()));
    }

    #[test]
    fn test_clear_all() {
        let cache = started();
        cache.put("a", b"1", Duration::ZERO).unwrap();
        cache.put("b", b"2", Duration::from_secs(60)).unwrap();

        cache.clear_all().unwrap();
        assert_eq!(cache.get_multi(&["a", "b"]), vec![None, None]);

        cache.put("c", b"3", Duration::ZERO).unwrap();
        assert!(cache.is_exist("c"));
    }

    #[test]
    fn test_double_start_rejected() {
        let mut cache = started();
        assert!(matches!(
            cache.start_and_gc(""),
            Err(CacheError::AlreadyStarted { .. })
        ));
    }

    #[test]
    fn test_with_config_is_started() {
        let cache = MemoryCache::with_config(MemoryConfig {
            capacity: Some(16),
        });
        assert_eq!(cache.config().unwrap().capacity, Some(16));
        cache.put("k", b"v", Duration::ZERO).unwrap();
        assert!(cache.is_exist("k"));
    }

    #[test]
    fn test_default_keeps_every_entry() {
        let cache = started();
        assert_eq!(cache.config().unwrap().capacity, None);

        for i in 0..20_000 {
            cache
                .put(&format!("key-{}", i), b"v", Duration::ZERO)
                .unwrap();
        }
        let missing = (0..20_000)
            .filter(|i| !cache.is_exist(&format!("key-{}", i)))
            .count();
        assert_eq!(missing, 0);
    }

    #[test]
    fn test_expiry_on_read_keeps_newer_write() {
        let cache = Arc::new(started());
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(std::sync::atomic::Ordering::Relaxed) {
                        cache.get("k");
                        cache.is_exist("k");
                    }
                })
            })
            .collect();

        let mut lost = 0;
        for _ in 0..2_000 {
            cache.put("k", b"old", Duration::from_micros(200)).unwrap();
            thread::sleep(Duration::from_micros(300));
            cache.put("k", b"new", Duration::ZERO).unwrap();
            if cache.get("k").as_deref() != Some(b"new".as_slice()) {
                lost += 1;
            }
        }

        done.store(true, std::sync::atomic::Ordering::Relaxed);
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(lost, 0);
    }
}
