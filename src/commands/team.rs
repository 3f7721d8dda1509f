//! Team overview and the small collaboration verbs (review, progress)
//!
//! Usage:
//!   hub team          # Human-readable overview
//!   hub team --json   # Machine-readable JSON output

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use agenthub::collab::{self, AgentSummary};
use agenthub::IntegrationPoint;

use super::{open_hub, parse_object, short_time};

#[derive(Debug, Serialize)]
struct LockInfo {
    path: String,
    agent: String,
    since: String,
}

#[derive(Debug, Serialize)]
struct TeamOverview {
    team: Vec<AgentSummary>,
    locked_files: Vec<LockInfo>,
    recent_integration: Vec<IntegrationPoint>,
}

pub fn run(dir: &Path, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;

    let overview = TeamOverview {
        team: collab::team_status(&hub)?,
        locked_files: collab::file_status(&hub)?
            .into_iter()
            .map(|(path, entry)| LockInfo {
                path,
                agent: entry.agent,
                since: entry.timestamp,
            })
            .collect(),
        recent_integration: collab::integration_status(&hub)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    println!("Team Status:");
    if overview.team.is_empty() {
        println!("  No status updates available");
    }
    for member in &overview.team {
        println!(
            "  - {}: {} ({})",
            member.agent,
            member.status,
            short_time(&member.timestamp)
        );
    }

    println!();
    if overview.locked_files.is_empty() {
        println!("No files currently locked");
    } else {
        println!("Locked files:");
        for lock in &overview.locked_files {
            println!("  - {} (locked by {})", lock.path, lock.agent);
        }
    }

    println!();
    if overview.recent_integration.is_empty() {
        println!("No integration points registered yet");
    } else {
        println!("Integration Points:");
        for point in &overview.recent_integration {
            println!("  - {} by {}", point.component, point.agent);
        }
    }
    Ok(())
}

pub fn run_review(dir: &Path, from: &str, path: &str, reviewer: &str) -> Result<()> {
    let hub = open_hub(dir)?;
    collab::request_review(&hub, from, path, reviewer)?;
    println!("Code review requested from {}", reviewer);
    Ok(())
}

pub fn run_progress(dir: &Path, agent: &str, progress: &str, details: Option<&str>) -> Result<()> {
    let details = parse_object(details)?;
    let hub = open_hub(dir)?;
    collab::share_progress(&hub, agent, progress, details)?;
    println!("Progress shared with team");
    Ok(())
}
