use anyhow::Result;
use std::path::Path;

use agenthub::RequestStatus;

use super::{open_hub, short_time};

pub fn run_create(dir: &Path, agent: &str, path: &str, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;
    let request = hub.request_lock_approval(agent, path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&request)?);
    } else {
        println!(
            "Requested '{}' for {} (request {})",
            path, agent, request.id
        );
    }
    Ok(())
}

pub fn run_list(dir: &Path, all: bool, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;
    let requests = if all {
        hub.lock_requests()?
    } else {
        hub.pending_requests()?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&requests)?);
        return Ok(());
    }

    if requests.is_empty() {
        println!("No pending file lock requests");
        return Ok(());
    }

    for (i, request) in requests.iter().enumerate() {
        let extra = match request.status {
            RequestStatus::Denied => request
                .denial_reason
                .as_deref()
                .map(|r| format!(" - {}", r))
                .unwrap_or_default(),
            _ => String::new(),
        };
        println!(
            "{}. [{}] {} wants {} (ID: {}, {}){}",
            i + 1,
            request.status,
            request.agent,
            request.file_path,
            request.id,
            short_time(&request.timestamp),
            extra
        );
    }
    Ok(())
}

pub fn run_approve(dir: &Path, id: &str) -> Result<()> {
    let hub = open_hub(dir)?;
    let request = hub.approve_request(id)?;
    println!(
        "Approved file lock for {} on {}",
        request.agent, request.file_path
    );
    Ok(())
}

pub fn run_deny(dir: &Path, id: &str, reason: Option<&str>) -> Result<()> {
    let hub = open_hub(dir)?;
    let request = hub.deny_request(id, reason)?;
    println!(
        "Denied file lock for {} on {}: {}",
        request.agent,
        request.file_path,
        request.denial_reason.as_deref().unwrap_or_default()
    );
    Ok(())
}

pub fn run_approve_all(dir: &Path) -> Result<()> {
    let hub = open_hub(dir)?;
    let approved = hub.approve_all()?;
    if approved.is_empty() {
        println!("No pending requests to approve");
    } else {
        println!("Approved {} file lock requests", approved.len());
    }
    let still_pending = hub.pending_requests()?;
    if !still_pending.is_empty() {
        eprintln!(
            "{} request(s) left pending: file already locked",
            still_pending.len()
        );
    }
    Ok(())
}
