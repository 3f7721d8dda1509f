use anyhow::Result;
use std::path::Path;

use super::{open_hub, short_time};

pub fn run_report(dir: &Path, agent: &str, details: &str, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;
    let report = hub.report_conflict(agent, details)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Conflict reported to {} ({})",
            hub.settings().integration_agent,
            report.id
        );
    }
    Ok(())
}

pub fn run_list(dir: &Path, all: bool, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;
    let conflicts = hub.conflicts(!all)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
    } else if conflicts.is_empty() {
        println!("No open conflicts");
    } else {
        for c in &conflicts {
            let mark = if c.resolved { "[x]" } else { "[ ]" };
            println!(
                "{} {} [{}] {}: {}",
                mark,
                c.id,
                short_time(&c.timestamp),
                c.agent,
                c.details
            );
        }
    }
    Ok(())
}

pub fn run_resolve(dir: &Path, id: &str) -> Result<()> {
    let hub = open_hub(dir)?;
    hub.resolve_conflict(id)?;
    println!("Resolved conflict '{}'", id);
    Ok(())
}
