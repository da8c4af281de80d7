//! Redis cache adapter.
//!
//! Maps the cache contract onto plain Redis commands. One connection is
//! opened by `start_and_gc` and shared by every caller; the mutex around it
//! is held only for the duration of a single command. Every command is
//! bounded by the `readTimeout` option. A connection that fails with an I/O
//! error or timeout is discarded and reopened by the next command.
//!
//! Keys are stored as `"{key}:{caller key}"` where `key` is the configured
//! namespace (default `beecacheRedis`). `clear_all` issues `FLUSHDB` and so
//! removes everything in the selected database, namespaced or not.

use super::traits::{namespaced, ttl_millis, Cache};
use crate::config::{ConfigPayload, RedisConfig};
use crate::error::{CacheError, Result};
use redis::{Commands, Connection, ErrorKind, RedisError, RedisResult};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Registry name of the Redis adapter.
pub const REDIS_ADAPTER: &str = "redis";

/// Connection plus the settings it was opened with.
///
/// The slot is empty after an I/O failure until the next command reconnects.
struct Session {
    config: RedisConfig,
    conn: Mutex<Option<Connection>>,
}

/// Redis-backed cache.
pub struct RedisCache {
    session: Option<Session>,
}

impl RedisCache {
    /// Create an unstarted adapter.
    pub fn new() -> Self {
        Self { session: None }
    }

    /// Factory used by the registry.
    pub fn boxed() -> Box<dyn Cache> {
        Box::new(Self::new())
    }

    /// Settings in effect, once started.
    pub fn config(&self) -> Option<&RedisConfig> {
        self.session.as_ref().map(|s| &s.config)
    }

    /// Namespace prefix applied to keys.
    pub fn key_prefix(&self) -> &str {
        self.config()
            .map(|c| c.key.as_str())
            .unwrap_or(RedisConfig::DEFAULT_KEY)
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(CacheError::NotStarted {
            adapter: REDIS_ADAPTER,
        })
    }

    fn associate(&self, key: &str) -> String {
        namespaced(self.key_prefix(), key)
    }

    /// Run one command against the shared connection.
    ///
    /// The outer error covers lifecycle and reconnect failures; the inner
    /// result is the command's own reply.
    fn exchange<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> Result<RedisResult<T>> {
        let session = self.session()?;
        let mut slot = session.conn.lock().map_err(|e| {
            CacheError::Other(format!("Failed to lock redis connection: {}", e))
        })?;

        let mut conn = match slot.take() {
            Some(conn) => conn,
            None => {
                debug!("Reconnecting to redis at {}", session.config.conn);
                Self::connect(&session.config)?
            }
        };

        let result = f(&mut conn);
        match &result {
            Err(e) if e.is_io_error() || e.is_connection_dropped() => {
                warn!("Dropping redis connection to {}: {}", session.config.conn, e);
            }
            _ => *slot = Some(conn),
        }
        Ok(result)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> RedisResult<T>) -> Result<T> {
        Ok(self.exchange(f)??)
    }

    fn adjust(&self, key: &str, command: &str) -> Result<i64> {
        let full_key = self.associate(key);
        self.exchange(|conn| redis::cmd(command).arg(&full_key).query(conn))?
            .map_err(|e| counter_error(key, e))
    }

    fn connect(config: &RedisConfig) -> Result<Connection> {
        let client = redis::Client::open(config.connection_url()).map_err(|e| {
            CacheError::config(format!("invalid conn '{}': {}", config.conn, e))
        })?;

        let mut conn = client
            .get_connection_with_timeout(config.connect_timeout)
            .map_err(|e| CacheError::Connection {
                message: format!("Failed to connect to redis at {}: {}", config.conn, e),
                source: Some(e),
            })?;

        let timeout = Some(config.read_timeout);
        conn.set_read_timeout(timeout)
            .and_then(|()| conn.set_write_timeout(timeout))
            .map_err(|e| CacheError::Connection {
                message: format!("Failed to set redis socket timeouts: {}", e),
                source: Some(e),
            })?;

        let pong: String = redis::cmd("PING")
            .query(&mut conn)
            .map_err(|e| CacheError::Connection {
                message: format!("Redis at {} did not answer PING: {}", config.conn, e),
                source: Some(e),
            })?;
        debug!("Redis at {} answered {}", config.conn, pong);

        Ok(conn)
    }
}

/// Map a failed INCR/DECR reply onto the counter errors shared by all adapters.
fn counter_error(key: &str, err: RedisError) -> CacheError {
    if err.kind() == ErrorKind::ResponseError {
        if let Some(detail) = err.detail() {
            if detail.contains("not an integer") {
                return CacheError::NotNumeric {
                    key: key.to_string(),
                };
            }
            if detail.contains("overflow") {
                return CacheError::Overflow {
                    key: key.to_string(),
                };
            }
        }
    }
    err.into()
}

impl Default for RedisCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for RedisCache {
    fn name(&self) -> &'static str {
        REDIS_ADAPTER
    }

    fn start_and_gc(&mut self, config: &str) -> Result<()> {
        if self.session.is_some() {
            return Err(CacheError::AlreadyStarted {
                adapter: REDIS_ADAPTER,
            });
        }

        let payload = ConfigPayload::parse(config)?;
        let config = RedisConfig::from_payload(&payload)?;
        let conn = Self::connect(&config)?;

        info!(
            "Redis cache started on {} (db {}, prefix '{}')",
            config.conn, config.db_num, config.key
        );

        self.session = Some(Session {
            config,
            conn: Mutex::new(Some(conn)),
        });
        Ok(())
    }

    fn try_get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = self.associate(key);
        self.with_conn(|conn| conn.get(&key))
    }

    fn try_get_multi(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let full_keys: Vec<String> = keys.iter().map(|k| self.associate(k)).collect();
        let values: Vec<Option<Vec<u8>>> =
            self.with_conn(|conn| redis::cmd("MGET").arg(&full_keys).query(conn))?;

        if values.len() != keys.len() {
            return Err(CacheError::Backend {
                message: format!(
                    "MGET returned {} values for {} keys",
                    values.len(),
                    keys.len()
                ),
                source: None,
            });
        }
        Ok(values)
    }

    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let key = self.associate(key);
        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(value);
        if let Some(millis) = ttl_millis(ttl) {
            cmd.arg("PX").arg(millis);
        }
        self.with_conn(|conn| cmd.query(conn))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let key = self.associate(key);
        self.with_conn(|conn| conn.del(&key))
    }

    fn try_is_exist(&self, key: &str) -> Result<bool> {
        let key = self.associate(key);
        self.with_conn(|conn| conn.exists(&key))
    }

    fn incr(&self, key: &str) -> Result<i64> {
        self.adjust(key, "INCR")
    }

    fn decr(&self, key: &str) -> Result<i64> {
        self.adjust(key, "DECR")
    }

    fn clear_all(&self) -> Result<()> {
        self.with_conn(|conn| redis::cmd("FLUSHDB").query::<()>(conn))?;
        if let Some(config) = self.config() {
            info!("Flushed redis database {} on {}", config.db_num, config.conn);
        }
        Ok(())
    }
}
