use anyhow::Result;
use chrono::Duration;
use std::path::Path;

use super::{open_hub, short_time};

pub fn run_acquire(dir: &Path, agent: &str, path: &str) -> Result<()> {
    let hub = open_hub(dir)?;
    if !hub.acquire_lock(agent, path)? {
        let holder = hub.lock_holder(path)?.unwrap_or_else(|| "unknown".to_string());
        anyhow::bail!("'{}' is already locked by {}", path, holder);
    }
    println!("Locked '{}' for {}", path, agent);
    Ok(())
}

pub fn run_release(dir: &Path, agent: &str, path: &str) -> Result<()> {
    let hub = open_hub(dir)?;
    if !hub.release_file_lock(agent, path)? {
        match hub.lock_holder(path)? {
            Some(holder) => anyhow::bail!(
                "Cannot release '{}': held by {}, not {}",
                path,
                holder,
                agent
            ),
            None => anyhow::bail!("'{}' is not locked", path),
        }
    }
    println!("Released '{}'", path);
    Ok(())
}

pub fn run_holder(dir: &Path, path: &str, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;
    let holder = hub.lock_holder(path)?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "path": path, "holder": holder })
        );
    } else {
        println!("{}", holder.as_deref().unwrap_or("No one"));
    }
    Ok(())
}

pub fn run_list(dir: &Path, stale_minutes: Option<i64>, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;

    let locks: Vec<_> = match stale_minutes {
        Some(minutes) => {
            let max_age = Duration::try_minutes(minutes)
                .filter(|d| *d >= Duration::zero())
                .ok_or_else(|| anyhow::anyhow!("--stale {} is out of range", minutes))?;
            hub.stale_locks(max_age)?
        }
        None => hub.file_locks()?.into_iter().collect(),
    };

    if json {
        let out: Vec<_> = locks
            .iter()
            .map(|(path, entry)| {
                serde_json::json!({
                    "path": path,
                    "agent": entry.agent,
                    "timestamp": entry.timestamp,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if locks.is_empty() {
        println!("No files currently locked");
    } else {
        for (path, entry) in &locks {
            println!(
                "{}  (locked by {} since {})",
                path,
                entry.agent,
                short_time(&entry.timestamp)
            );
        }
    }
    Ok(())
}

pub fn run_break(dir: &Path, path: &str) -> Result<()> {
    let hub = open_hub(dir)?;
    match hub.force_release(path)? {
        Some(entry) => println!("Broke lock on '{}' (was held by {})", path, entry.agent),
        None => anyhow::bail!("'{}' is not locked", path),
    }
    Ok(())
}
