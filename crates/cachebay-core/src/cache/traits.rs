//! Cache capability trait and shared helpers.

use crate::error::Result;
use std::fmt;
use std::time::Duration;

/// Capability contract every cache adapter implements.
///
/// Adapters are created unstarted by a registry factory and become usable
/// after a single successful [`Cache::start_and_gc`]. All operations are
/// synchronous and block on the backend call; none are retried.
///
/// Lookups come in two flavours. The `try_*` methods report backend
/// failures as errors. The plain methods (`get`, `get_multi`, `is_exist`)
/// fold failures into "absent", so a miss and an unreachable backend look
/// the same to the caller.
pub trait Cache: Send + Sync {
    /// Registry name of this adapter.
    fn name(&self) -> &'static str;

    /// Parse `config`, apply defaults, connect and probe the backend.
    ///
    /// Must succeed once before any other operation is used. A second call
    /// fails with [`CacheError::AlreadyStarted`](crate::CacheError::AlreadyStarted).
    fn start_and_gc(&mut self, config: &str) -> Result<()>;

    /// Fetch the value stored at `key`.
    fn try_get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Fetch the value stored at `key`, `None` on miss or backend error.
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.try_get(key).ok().flatten()
    }

    /// Fetch several keys in one batch.
    ///
    /// The result has the same length and order as `keys`.
    fn try_get_multi(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Batch fetch; an empty vector if the batch failed.
    fn get_multi(&self, keys: &[&str]) -> Vec<Option<Vec<u8>>> {
        self.try_get_multi(keys).unwrap_or_default()
    }

    /// Store `value` at `key`. A zero `ttl` stores it without expiration.
    ///
    /// A memory adapter configured with a `capacity` may still evict the
    /// entry once that bound is reached.
    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Remove `key`. Succeeds whether or not the key existed.
    fn delete(&self, key: &str) -> Result<()>;

    /// Check whether `key` is present.
    fn try_is_exist(&self, key: &str) -> Result<bool>;

    /// Check whether `key` is present, `false` on backend error.
    fn is_exist(&self, key: &str) -> bool {
        self.try_is_exist(key).unwrap_or(false)
    }

    /// Atomically add one to the integer at `key`, returning the new value.
    ///
    /// A missing key counts as zero. Fails without modifying the entry when
    /// the stored value is not an integer.
    fn incr(&self, key: &str) -> Result<i64>;

    /// Atomically subtract one from the integer at `key`.
    fn decr(&self, key: &str) -> Result<i64>;

    /// Remove every key in the backend's current database.
    ///
    /// This is not limited to the adapter's own namespace: entries written
    /// by other adapters or clients sharing the database are removed too.
    fn clear_all(&self) -> Result<()>;
}

impl fmt::Debug for dyn Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").field("adapter", &self.name()).finish()
    }
}

/// Expiry in whole milliseconds, `None` for entries that never expire.
///
/// Sub-millisecond TTLs round up so they still expire.
pub(crate) fn ttl_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    Some(millis.max(1))
}

/// Join a namespace and a caller key the way all adapters store them.
pub(crate) fn namespaced(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", prefix, key)
    }
}

/// Parse a stored counter value.
pub(crate) fn parse_counter(raw: &[u8]) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.parse().ok()
}
