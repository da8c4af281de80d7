//! Subcommands and their execution against a started cache.

use anyhow::{Context, Result};
use cachebay::Cache;
use clap::Subcommand;
use std::time::Duration;

/// Printed for absent values.
const NIL: &str = "(nil)";

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the value stored at a key
    Get { key: String },

    /// Print the values of several keys, one per line
    Mget {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Store a value
    Put {
        key: String,
        value: String,
        /// Expiration in seconds (0 = never)
        #[arg(long, default_value = "0")]
        ttl: u64,
    },

    /// Remove a key
    Delete { key: String },

    /// Print whether a key exists
    Exists { key: String },

    /// Increment the integer at a key
    Incr { key: String },

    /// Decrement the integer at a key
    Decr { key: String },

    /// Remove every key in the adapter's database
    Clear,

    /// List registered adapter names
    Adapters,
}

fn render(value: Option<Vec<u8>>) -> String {
    match value {
        Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        None => NIL.to_string(),
    }
}

/// Run `command` and return what should be printed.
///
/// Lookups use the fallible variants so a backend failure is reported
/// instead of printing `(nil)`.
pub fn execute(cache: &dyn Cache, command: &Command) -> Result<String> {
    let output = match command {
        Command::Get { key } => render(
            cache
                .try_get(key)
                .with_context(|| format!("GET {} failed", key))?,
        ),
        Command::Mget { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            cache
                .try_get_multi(&keys)
                .context("MGET failed")?
                .into_iter()
                .map(render)
                .collect::<Vec<_>>()
                .join("\n")
        }
        Command::Put { key, value, ttl } => {
            cache
                .put(key, value.as_bytes(), Duration::from_secs(*ttl))
                .with_context(|| format!("PUT {} failed", key))?;
            "OK".to_string()
        }
        Command::Delete { key } => {
            cache
                .delete(key)
                .with_context(|| format!("DELETE {} failed", key))?;
            "OK".to_string()
        }
        Command::Exists { key } => cache
            .try_is_exist(key)
            .with_context(|| format!("EXISTS {} failed", key))?
            .to_string(),
        Command::Incr { key } => cache
            .incr(key)
            .with_context(|| format!("INCR {} failed", key))?
            .to_string(),
        Command::Decr { key } => cache
            .decr(key)
            .with_context(|| format!("DECR {} failed", key))?
            .to_string(),
        Command::Clear => {
            cache.clear_all().context("CLEAR failed")?;
            "OK".to_string()
        }
        Command::Adapters => String::new(),
    };

    Ok(output)
}
