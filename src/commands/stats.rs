use anyhow::Result;
use chrono::Utc;
use std::path::Path;

use agenthub::HubStats;
use agenthub::stats::session_start;

use super::open_hub;

pub fn run(dir: &Path, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;
    let doc = hub.snapshot()?;
    let stats = HubStats::collect(&doc, session_start(&doc).unwrap_or_else(Utc::now));

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Session:        {}", stats.session_duration());
    println!(
        "Messages:       {} ({} unread, {:.2}/min)",
        stats.total_messages, stats.unread_messages, stats.messages_per_minute
    );
    for (kind, count) in &stats.messages_by_type {
        println!("  {:<22} {}", kind, count);
    }
    println!(
        "Lock requests:  {} ({} approved, {} denied, {} pending)",
        stats.lock_requests, stats.lock_approvals, stats.lock_denials, stats.pending_requests
    );
    println!("Locked files:   {}", stats.locked_files);
    println!(
        "Files:          {} created, {} modified",
        stats.files_created, stats.files_modified
    );
    println!("Integration:    {} points", stats.integration_points);
    println!("Conflicts:      {} open", stats.open_conflicts);
    println!("Context keys:   {}", stats.context_keys);
    println!("Active agents:  {}", stats.active_agents);
    println!("Avg response:   {:.2}s", stats.avg_response_time);

    if !stats.hourly_activity.is_empty() {
        println!();
        println!("Hourly activity (UTC):");
        for bucket in &stats.hourly_activity {
            println!(
                "  {}  {:>4} msgs  {:>3} agents",
                bucket.hour, bucket.messages, bucket.agents_active
            );
        }
    }

    if !stats.agents.is_empty() {
        println!();
        println!("Agents:");
        for (agent, activity) in &stats.agents {
            println!(
                "  {:<24} sent {:>3}  created {:>3}  modified {:>3}  last {}",
                agent,
                activity.messages_sent,
                activity.files_created,
                activity.files_modified,
                activity
                    .last_activity
                    .as_deref()
                    .map(super::short_time)
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }
    Ok(())
}
