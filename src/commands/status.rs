use anyhow::Result;
use std::path::Path;

use super::{open_hub, parse_object, short_time};

pub fn run_set(dir: &Path, agent: &str, status: &str, details: Option<&str>) -> Result<()> {
    let details = parse_object(details)?;
    let hub = open_hub(dir)?;
    hub.update_status(agent, status, details)?;
    println!("{}: {}", agent, status);
    Ok(())
}

pub fn run_show(dir: &Path, agent: Option<&str>, latest: bool, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;

    let updates = if latest {
        let mut latest: Vec<_> = hub.latest_status()?.into_values().collect();
        if let Some(name) = agent {
            latest.retain(|s| s.agent == name);
        }
        latest
    } else {
        hub.agent_status(agent)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&updates)?);
        return Ok(());
    }

    if updates.is_empty() {
        println!("No status updates");
        return Ok(());
    }

    for update in &updates {
        print!(
            "[{}] {}: {}",
            short_time(&update.timestamp),
            update.agent,
            update.status
        );
        if !update.details.is_empty() {
            print!("  {}", serde_json::Value::Object(update.details.clone()));
        }
        println!();
    }
    Ok(())
}
