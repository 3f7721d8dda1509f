pub mod conflict;
pub mod context;
pub mod deps;
pub mod init;
pub mod integration;
pub mod lock;
pub mod message;
pub mod request;
pub mod stats;
pub mod status;
pub mod team;
pub mod write;

use std::path::Path;

use anyhow::{Context, Result};
use agenthub::{CommunicationHub, Config};
use serde_json::{Map, Value};

/// Open the hub in `dir`, honoring its config.toml.
pub fn open_hub(dir: &Path) -> Result<CommunicationHub> {
    if !dir.exists() {
        anyhow::bail!("Hub not initialized. Run 'hub init' first.");
    }
    let config = Config::load(dir)?;
    let path = config.store_path(dir);
    CommunicationHub::open(path, config.hub).context("Failed to open hub document")
}

/// Parse a `--details`/`--interface` argument, which must be a JSON object
pub fn parse_object(raw: Option<&str>) -> Result<Option<Map<String, Value>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw).context("Details must be valid JSON")? {
        Value::Object(map) => Ok(Some(map)),
        other => anyhow::bail!("Expected a JSON object, got: {}", other),
    }
}

/// Shorten RFC 3339 timestamps to `YYYY-MM-DD HH:MM:SS` for display
pub fn short_time(ts: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(ts) {
        Ok(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => ts.to_string(),
    }
}
