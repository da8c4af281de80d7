//! SQLite-backed file cache adapter.
//!
//! Entries are rows keyed by `(namespace, key)` in a single table. The
//! namespace is the adapter's `key` option, so several adapters can share
//! one database file. `clear_all` empties the whole table regardless of
//! namespace.

use super::traits::{parse_counter, ttl_millis, Cache};
use crate::config::{ConfigPayload, FileConfig};
use crate::error::{CacheError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Registry name of the file adapter.
pub const FILE_ADAPTER: &str = "file";

struct Store {
    conn: Mutex<Connection>,
    config: FileConfig,
}

/// SQLite-based cache backend.
///
/// Thread-safe via an internal mutex on the connection.
pub struct SqliteCache {
    store: Option<Store>,
}

impl SqliteCache {
    /// Create an unstarted adapter.
    pub fn new() -> Self {
        Self { store: None }
    }

    /// Factory used by the registry.
    pub fn boxed() -> Box<dyn Cache> {
        Box::new(Self::new())
    }

    /// Open (and create if needed) the database described by `config`.
    ///
    /// The returned adapter is already started.
    pub fn open(config: FileConfig) -> Result<Self> {
        Ok(Self {
            store: Some(Store::open(config)?),
        })
    }

    /// Settings in effect, once started.
    pub fn config(&self) -> Option<&FileConfig> {
        self.store.as_ref().map(|s| &s.config)
    }

    fn store(&self) -> Result<&Store> {
        self.store.as_ref().ok_or(CacheError::NotStarted {
            adapter: FILE_ADAPTER,
        })
    }

    /// Remove expired rows from every namespace.
    ///
    /// Returns the number of rows removed.
    pub fn cleanup_expired(&self) -> Result<usize> {
        self.store()?.cleanup_expired()
    }

    /// Number of live entries in this adapter's namespace.
    pub fn entry_count(&self) -> Result<usize> {
        let store = self.store()?;
        let conn = store.lock()?;

        let count: i64 = conn
            .query_row(
                r#"
                SELECT COUNT(*) FROM cache_entries
                WHERE namespace = ?1 AND (expires_at IS NULL OR expires_at > ?2)
                "#,
                params![store.config.key, now_millis()],
                |row| row.get(0),
            )
            .map_err(|e| CacheError::Database {
                message: format!("Failed to count cache entries: {}", e),
                source: Some(e),
            })?;

        Ok(count as usize)
    }

    fn adjust(&self, key: &str, delta: i64) -> Result<i64> {
        let store = self.store()?;
        let mut conn = store.lock()?;
        let now = now_millis();

        let tx = conn.transaction().map_err(|e| CacheError::Database {
            message: format!("Failed to begin transaction: {}", e),
            source: Some(e),
        })?;

        let row: Option<(Vec<u8>, Option<i64>)> = tx
            .query_row(
                r#"
                SELECT value, expires_at FROM cache_entries
                WHERE namespace = ?1 AND key = ?2 AND (expires_at IS NULL OR expires_at > ?3)
                "#,
                params![store.config.key, key, now],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| CacheError::Database {
                message: format!("Failed to read counter: {}", e),
                source: Some(e),
            })?;

        let (current, expires_at) = match row {
            Some((value, expires_at)) => {
                let current = parse_counter(&value).ok_or_else(|| CacheError::NotNumeric {
                    key: key.to_string(),
                })?;
                (current, expires_at)
            }
            None => (0, None),
        };

        let next = current
            .checked_add(delta)
            .ok_or_else(|| CacheError::Overflow {
                key: key.to_string(),
            })?;

        tx.execute(
            r#"
            INSERT OR REPLACE INTO cache_entries (namespace, key, value, cached_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                store.config.key,
                key,
                next.to_string().into_bytes(),
                Utc::now().to_rfc3339(),
                expires_at
            ],
        )
        .map_err(|e| CacheError::Database {
            message: format!("Failed to write counter: {}", e),
            source: Some(e),
        })?;

        tx.commit().map_err(|e| CacheError::Database {
            message: format!("Failed to commit counter update: {}", e),
            source: Some(e),
        })?;

        Ok(next)
    }
}

impl Store {
    fn open(config: FileConfig) -> Result<Self> {
        let db_path = config.path.as_path();

        // Create parent directory if needed
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                message: format!("Failed to create cache directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| CacheError::Database {
            message: format!("Failed to open cache database: {}", e),
            source: Some(e),
        })?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| CacheError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                cached_at TEXT NOT NULL,
                expires_at INTEGER,
                PRIMARY KEY (namespace, key)
            );

            -- Index for expiration queries
            CREATE INDEX IF NOT EXISTS idx_cache_expires
                ON cache_entries(expires_at);
            "#,
        )
        .map_err(|e| CacheError::Database {
            message: format!("Failed to initialize cache schema: {}", e),
            source: Some(e),
        })?;

        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    fn cleanup_expired(&self) -> Result<usize> {
        let conn = self.lock()?;

        let deleted = conn
            .execute(
                "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![now_millis()],
            )
            .map_err(|e| CacheError::Database {
                message: format!("Failed to cleanup expired entries: {}", e),
                source: Some(e),
            })?;

        if deleted > 0 {
            debug!("Cleaned up {} expired cache entries", deleted);
        }

        Ok(deleted)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| CacheError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry_millis(ttl: Duration) -> Option<i64> {
    ttl_millis(ttl).map(|ms| now_millis().saturating_add(i64::try_from(ms).unwrap_or(i64::MAX)))
}

impl Default for SqliteCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for SqliteCache {
    fn name(&self) -> &'static str {
        FILE_ADAPTER
    }

    fn start_and_gc(&mut self, config: &str) -> Result<()> {
        if self.store.is_some() {
            return Err(CacheError::AlreadyStarted {
                adapter: FILE_ADAPTER,
            });
        }

        let payload = ConfigPayload::parse(config)?;
        let config = FileConfig::from_payload(&payload)?;
        let path = config.path.clone();
        let store = Store::open(config)?;
        let removed = store.cleanup_expired()?;
        self.store = Some(store);

        info!(
            "File cache started at {} ({} expired entries removed)",
            path.display(),
            removed
        );
        Ok(())
    }

    fn try_get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let store = self.store()?;
        let conn = store.lock()?;

        conn.query_row(
            r#"
            SELECT value FROM cache_entries
            WHERE namespace = ?1 AND key = ?2 AND (expires_at IS NULL OR expires_at > ?3)
            "#,
            params![store.config.key, key, now_millis()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| CacheError::Database {
            message: format!("Failed to query cache entry: {}", e),
            source: Some(e),
        })
    }

    fn try_get_multi(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        let store = self.store()?;
        let conn = store.lock()?;
        let now = now_millis();

        let mut stmt = conn
            .prepare_cached(
                r#"
                SELECT value FROM cache_entries
                WHERE namespace = ?1 AND key = ?2 AND (expires_at IS NULL OR expires_at > ?3)
                "#,
            )
            .map_err(|e| CacheError::Database {
                message: format!("Failed to prepare batch query: {}", e),
                source: Some(e),
            })?;

        keys.iter()
            .map(|key| {
                stmt.query_row(params![store.config.key, key, now], |row| row.get(0))
                    .optional()
                    .map_err(|e| CacheError::Database {
                        message: format!("Failed to query cache entry: {}", e),
                        source: Some(e),
                    })
            })
            .collect()
    }

    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let store = self.store()?;
        let conn = store.lock()?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO cache_entries (namespace, key, value, cached_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                store.config.key,
                key,
                value,
                Utc::now().to_rfc3339(),
                expiry_millis(ttl)
            ],
        )
        .map_err(|e| CacheError::Database {
            message: format!("Failed to set cache entry: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let store = self.store()?;
        let conn = store.lock()?;

        conn.execute(
            "DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2",
            params![store.config.key, key],
        )
        .map_err(|e| CacheError::Database {
            message: format!("Failed to delete cache entry: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    fn try_is_exist(&self, key: &str) -> Result<bool> {
        let store = self.store()?;
        let conn = store.lock()?;

        let exists = conn
            .query_row(
                r#"
                SELECT 1 FROM cache_entries
                WHERE namespace = ?1 AND key = ?2 AND (expires_at IS NULL OR expires_at > ?3)
                LIMIT 1
                "#,
                params![store.config.key, key, now_millis()],
                |_| Ok(true),
            )
            .optional()
            .map_err(|e| CacheError::Database {
                message: format!("Failed to check cache entry: {}", e),
                source: Some(e),
            })?
            .unwrap_or(false);

        Ok(exists)
    }

    fn incr(&self, key: &str) -> Result<i64> {
        self.adjust(key, 1)
    }

    fn decr(&self, key: &str) -> Result<i64> {
        self.adjust(key, -1)
    }

    fn clear_all(&self) -> Result<()> {
        let store = self.store()?;
        let conn = store.lock()?;

        let deleted = conn
            .execute("DELETE FROM cache_entries", [])
            .map_err(|e| CacheError::Database {
                message: format!("Failed to clear cache entries: {}", e),
                source: Some(e),
            })?;

        info!(
            "Cleared all {} entries from {}",
            deleted,
            store.config.path.display()
        );

        Ok(())
    }
}
