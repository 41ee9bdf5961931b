//! Argument and startup helpers shared by the binaries.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::config::{db_path_from_env, load_dotenv};
use crate::store::{SqliteStore, StatStore, default_db_path};

/// `.env` files, then a fmt subscriber filtered by `RUST_LOG` (default `info`).
pub fn init() {
    load_dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Value of `--name=value` or `--name value`.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() && !next.starts_with("--") {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

pub fn parse_arg<T: std::str::FromStr>(args: &[String], name: &str) -> Option<T> {
    arg_value(args, name).and_then(|raw| raw.parse::<T>().ok())
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

/// Arguments that are neither flags nor flag values.
pub fn positional(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            skip_next = !arg.contains('=') && !is_switch(arg);
            continue;
        }
        out.push(arg.clone());
    }
    out
}

/// Flags that never take a value.
fn is_switch(arg: &str) -> bool {
    matches!(arg, "--pretty" | "--career" | "--dry-run" | "--help" | "--external")
}

/// `--db`, then `FORECAST_DB_PATH`, then the cache-dir default.
pub fn resolve_db_path(args: &[String]) -> Result<PathBuf> {
    arg_value(args, "--db")
        .map(PathBuf::from)
        .or_else(db_path_from_env)
        .or_else(default_db_path)
        .context("unable to resolve sqlite path")
}

pub fn open_store(args: &[String]) -> Result<(SqliteStore, PathBuf)> {
    let path = resolve_db_path(args)?;
    let store = SqliteStore::open(&path)?;
    Ok((store, path))
}

/// Store row id for a `--player` value.
///
/// With `external` the value is always an external id. Otherwise a numeric
/// value is tried as a row id first and falls back to the external-id lookup
/// (numeric feed ids) when no row has that id.
pub fn resolve_player(store: &SqliteStore, raw: &str, external: bool) -> Result<i64> {
    if !external
        && let Ok(id) = raw.parse::<i64>()
        && store.player(id)?.is_some()
    {
        return Ok(id);
    }
    store
        .player_by_external_id(raw)?
        .map(|p| p.id)
        .ok_or_else(|| anyhow!("player not found: {raw}"))
}

pub fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("serialize output")?;
    println!("{out}");
    Ok(())
}
