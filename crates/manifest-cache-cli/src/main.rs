//! manifest-cache - command-line access to the cached Destiny 2 manifest.
//!
//! Results are written to stdout as JSON; logs go to stderr.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use manifest_cache_core::{CacheCoordinator, Config};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: manifest-cache <command>

Commands:
  info                       Compare the remote manifest version with the cache
  status                     Show what is cached, without contacting the remote
  document                   Print the whole manifest
  table <name>               Print one table
  definition <table> <hash>  Print one definition
  refresh                    Download the current manifest regardless of cache age
  clear                      Remove the cached manifest

Configuration is read from the environment (and a .env file):
  BUNGIE_API_KEY (required), MANIFEST_CACHE_DIR, MANIFEST_LOCALE,
  MANIFEST_MAX_AGE_HOURS, MANIFEST_API_BASE_URL, MANIFEST_CONTENT_BASE_URL,
  MANIFEST_REQUEST_TIMEOUT_SECS, MANIFEST_MANIFEST_TIMEOUT_SECS
Set RUST_LOG (e.g. RUST_LOG=debug) for logging.";

enum Command {
    Info,
    Status,
    Document,
    Table(String),
    Definition(String, String),
    Refresh,
    Clear,
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = match args.as_slice() {
            ["info"] => Command::Info,
            ["status"] => Command::Status,
            ["document"] => Command::Document,
            ["table", name] => Command::Table(name.to_string()),
            ["definition", table, hash] => Command::Definition(table.to_string(), hash.to_string()),
            ["refresh"] => Command::Refresh,
            ["clear"] => Command::Clear,
            [] | ["help"] | ["--help"] | ["-h"] => Command::Help,
            _ => bail!("Unrecognized arguments: {}\n\n{}", args.join(" "), USAGE),
        };
        Ok(command)
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if pretty {
        serde_json::to_writer_pretty(&mut out, value)?;
    } else {
        serde_json::to_writer(&mut out, value)?;
    }
    writeln!(out)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    if let Command::Help = command {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::from_env().context("Invalid configuration")?;
    let coordinator =
        CacheCoordinator::from_config(&config).context("Failed to set up manifest cache")?;
    info!(cache_dir = %config.cache_dir.display(), locale = %config.locale, "Manifest cache ready");

    match command {
        Command::Info => print_json(&coordinator.get_info().await?, true)?,
        Command::Status => match coordinator.status().await? {
            Some(status) => print_json(&status, true)?,
            None => print_json(&serde_json::Value::Null, true)?,
        },
        Command::Document => print_json(&*coordinator.get_document().await?, false)?,
        Command::Table(name) => print_json(&coordinator.get_table(&name).await?, false)?,
        Command::Definition(table, hash) => {
            print_json(&coordinator.get_definition(&table, &hash).await?, true)?
        }
        Command::Refresh => print_json(&coordinator.force_refresh().await?, true)?,
        Command::Clear => {
            coordinator.clear().await?;
            eprintln!("Cache cleared: {}", config.cache_dir.display());
        }
        Command::Help => println!("{}", USAGE),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Command::parse(&args)
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse(&["info"]), Ok(Command::Info)));
        assert!(matches!(parse(&["status"]), Ok(Command::Status)));
        assert!(matches!(parse(&["document"]), Ok(Command::Document)));
        assert!(matches!(parse(&["refresh"]), Ok(Command::Refresh)));
        assert!(matches!(parse(&["clear"]), Ok(Command::Clear)));
        assert!(matches!(parse(&[]), Ok(Command::Help)));
        assert!(matches!(
            parse(&["table", "DestinyStatDefinition"]),
            Ok(Command::Table(ref t)) if t == "DestinyStatDefinition"
        ));
        assert!(matches!(
            parse(&["definition", "DestinyInventoryItemDefinition", "1363886209"]),
            Ok(Command::Definition(ref t, ref h))
                if t == "DestinyInventoryItemDefinition" && h == "1363886209"
        ));
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        assert!(parse(&["table"]).is_err());
        assert!(parse(&["definition", "DestinyStatDefinition"]).is_err());
        assert!(parse(&["refresh", "now"]).is_err());
        assert!(parse(&["unknown"]).is_err());
    }
}
