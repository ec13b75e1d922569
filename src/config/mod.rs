//! Configuration module for tradefleet.
//!
//! Environment binding happens only here, at the edge: the rest of the
//! engine receives plain config structs threaded through constructors.
//! Debug switches are struct fields, never process-wide globals.

mod accounts;
mod execution_config;
mod pipeline_config;

pub use accounts::load_accounts;
pub use execution_config::ExecutionEnvConfig;
pub use pipeline_config::PipelineConfig;

use std::env;
use std::str::FromStr;

/// Load a local .env file when present. Call once at process start, before
/// binding any configuration.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Read an env var through `FromStr`, falling back to `default` when the
/// variable is absent or unparseable.
pub(crate) fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Boolean env flag: 1/true/yes/on count as true, everything else false.
pub(crate) fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => matches!(
            raw.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

/// Comma-separated env list parsed through `FromStr`, skipping entries that
/// fail to parse.
pub(crate) fn env_list<T: FromStr>(key: &str) -> Option<Vec<T>> {
    let raw = env::var(key).ok()?;
    let parsed: Vec<T> = raw
        .split(',')
        .filter_map(|item| item.trim().parse::<T>().ok())
        .collect();
    if parsed.is_empty() { None } else { Some(parsed) }
}
