//! cachebay CLI - run single cache operations against any registered adapter.
//!
//! ```text
//! cachebay --adapter redis --config '{"conn":"127.0.0.1:6379"}' put greeting hello --ttl 60
//! cachebay --adapter redis --config '{"conn":"127.0.0.1:6379"}' get greeting
//! ```

mod commands;

use anyhow::{Context, Result};
use cachebay::AdapterRegistry;
use clap::Parser;
use commands::Command;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "cachebay")]
#[command(about = "Run cache operations through a named adapter")]
struct Args {
    /// Adapter name (redis, memory, file)
    #[arg(short, long, default_value = "redis")]
    adapter: String,

    /// Adapter configuration as a JSON object
    #[arg(short, long, default_value = "{}")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let registry = AdapterRegistry::with_builtin_adapters();

    if let Command::Adapters = args.command {
        for name in registry.names() {
            println!("{}", name);
        }
        return Ok(());
    }

    debug!("Opening '{}' adapter", args.adapter);
    let cache = registry
        .new_cache(&args.adapter, &args.config)
        .with_context(|| format!("Failed to start '{}' cache", args.adapter))?;

    let output = commands::execute(cache.as_ref(), &args.command)?;
    if !output.is_empty() {
        println!("{}", output);
    }

    Ok(())
}
