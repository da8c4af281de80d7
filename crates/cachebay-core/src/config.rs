//! Adapter configuration.
//!
//! Every adapter is started from a flat JSON object of string options, for
//! example `{"key":"sessions","conn":"127.0.0.1:6379","dbNum":"2"}`.
//! [`ConfigPayload`] parses that object once; each adapter then builds its
//! own typed config from it, applying defaults and validating required
//! fields before any connection is attempted.

use crate::error::{CacheError, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

/// Parsed option map handed to an adapter's `start_and_gc`.
#[derive(Debug, Clone, Default)]
pub struct ConfigPayload {
    options: Map<String, Value>,
}

impl ConfigPayload {
    /// Parse a configuration string.
    ///
    /// A blank string is an empty option set. Anything else must be a JSON
    /// object; unrecognized keys are kept but ignored by adapters.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_str(raw).map_err(|e| CacheError::Json {
            message: format!("Invalid cache configuration: {}", e),
            source: Some(e),
        })?;

        match value {
            Value::Object(options) => Ok(Self { options }),
            other => Err(CacheError::config(format!(
                "cache configuration must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Get an option as a string.
    ///
    /// Options are specified as strings. Numbers and booleans are accepted
    /// and rendered in their JSON form; `null` counts as absent.
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        match self.options.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
            Some(other) => Err(CacheError::config(format!(
                "option '{}' must be a string, got {}",
                name,
                json_type_name(other)
            ))),
        }
    }

    /// Get an option, falling back to `default` when absent.
    pub fn get_or(&self, name: &str, default: &str) -> Result<String> {
        Ok(self.get(name)?.unwrap_or_else(|| default.to_string()))
    }

    /// Get a mandatory option.
    pub fn require(&self, name: &str) -> Result<String> {
        self.get(name)?
            .ok_or_else(|| CacheError::config(format!("config has no {} key", name)))
    }

    /// Get an optional option and parse it as a number.
    pub fn parse_opt<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name)? {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                CacheError::config(format!("option '{}' is not a valid number: {:?}", name, raw))
            }),
        }
    }

    /// Get an option and parse it as a number.
    pub fn parse_or<T: std::str::FromStr>(&self, name: &str, default: T) -> Result<T> {
        Ok(self.parse_opt(name)?.unwrap_or(default))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Settings for the Redis adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Namespace prefix applied to every key; empty disables prefixing.
    pub key: String,
    /// `host:port` or a `redis://` URL.
    pub conn: String,
    /// Logical database index.
    pub db_num: i64,
    /// Password for AUTH; empty means none.
    pub password: String,
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
    /// Socket read and write timeout for every command.
    pub read_timeout: Duration,
}

impl RedisConfig {
    pub const DEFAULT_KEY: &'static str = "beecacheRedis";
    pub const DEFAULT_DB_NUM: i64 = 0;
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
    pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 3;

    /// Build from a parsed payload, applying defaults.
    pub fn from_payload(payload: &ConfigPayload) -> Result<Self> {
        let conn = payload.require("conn")?;
        if conn.trim().is_empty() {
            return Err(CacheError::config("option 'conn' is empty"));
        }

        let db_num = payload.parse_or("dbNum", Self::DEFAULT_DB_NUM)?;
        if db_num < 0 {
            return Err(CacheError::config(format!(
                "option 'dbNum' must not be negative: {}",
                db_num
            )));
        }

        let connect_timeout =
            positive_secs(payload, "connectTimeout", Self::DEFAULT_CONNECT_TIMEOUT_SECS)?;
        let read_timeout = positive_secs(payload, "readTimeout", Self::DEFAULT_READ_TIMEOUT_SECS)?;

        Ok(Self {
            key: payload.get_or("key", Self::DEFAULT_KEY)?,
            conn: conn.trim().to_string(),
            db_num,
            password: payload.get_or("password", "")?,
            connect_timeout,
            read_timeout,
        })
    }

    /// Connection URL understood by the redis client.
    ///
    /// A bare `host:port` is expanded with the password and database index.
    /// A full URL is used as-is, so it carries its own credentials and db.
    pub fn connection_url(&self) -> String {
        if self.conn.contains("://") {
            return self.conn.clone();
        }

        if self.password.is_empty() {
            format!("redis://{}/{}", self.conn, self.db_num)
        } else {
            format!(
                "redis://:{}@{}/{}",
                urlencoding::encode(&self.password),
                self.conn,
                self.db_num
            )
        }
    }
}

/// Timeout option in whole seconds; zero is rejected.
fn positive_secs(payload: &ConfigPayload, name: &str, default: u64) -> Result<Duration> {
    let secs = payload.parse_or(name, default)?;
    if secs == 0 {
        return Err(CacheError::config(format!(
            "option '{}' must be at least 1 second",
            name
        )));
    }
    Ok(Duration::from_secs(secs))
}

/// Settings for the in-memory adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Maximum number of entries kept before eviction; `None` is unbounded.
    ///
    /// Once the bound is reached any entry may be evicted, even one stored
    /// without a TTL.
    pub capacity: Option<u64>,
}

impl MemoryConfig {
    pub fn from_payload(payload: &ConfigPayload) -> Result<Self> {
        let capacity = payload.parse_opt::<u64>("capacity")?;
        if capacity == Some(0) {
            return Err(CacheError::config("option 'capacity' must be positive"));
        }
        Ok(Self { capacity })
    }
}

/// Settings for the SQLite file adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConfig {
    /// Namespace the adapter's rows are stored under.
    pub key: String,
    /// Database file location.
    pub path: PathBuf,
}

impl FileConfig {
    pub const DEFAULT_KEY: &'static str = "beecacheFile";

    pub fn from_payload(payload: &ConfigPayload) -> Result<Self> {
        let path = payload.require("path")?;
        if path.trim().is_empty() {
            return Err(CacheError::config("option 'path' is empty"));
        }

        Ok(Self {
            key: payload.get_or("key", Self::DEFAULT_KEY)?,
            path: PathBuf::from(path),
        })
    }
}
