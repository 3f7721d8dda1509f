use anyhow::Result;
use serde_json::Value;
use std::path::Path;

use super::open_hub;

/// Values that parse as JSON are stored as such; anything else is a string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn run_set(dir: &Path, key: &str, value: &str) -> Result<()> {
    let hub = open_hub(dir)?;
    hub.update_shared_context(key, parse_value(value))?;
    println!("Set '{}'", key);
    Ok(())
}

pub fn run_get(dir: &Path, key: Option<&str>, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;

    let Some(key) = key else {
        let all = hub.all_shared_context()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&all)?);
        } else if all.is_empty() {
            println!("Shared context is empty");
        } else {
            for (k, v) in &all {
                println!("{} = {}", k, v);
            }
        }
        return Ok(());
    };

    match hub.shared_context(key)? {
        Some(value) if json => println!("{}", serde_json::to_string_pretty(&value)?),
        Some(Value::String(s)) => println!("{}", s),
        Some(value) => println!("{}", value),
        None => anyhow::bail!("Key '{}' not set", key),
    }
    Ok(())
}
