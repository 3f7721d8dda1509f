//! Higher-level collaboration workflows built on hub primitives.
//!
//! These are the operations agents actually perform: writing a shared file
//! under a lock while keeping the team informed, asking for reviews,
//! reporting progress, and summarizing who is doing what.

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fs;
use std::path::Path;

use crate::hub::{BROADCAST, CommunicationHub, HubError, Result};
use crate::store::{FileLockEntry, IntegrationPoint};

/// Whether a collaborative write created or replaced the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteAction {
    Created,
    Modified,
}

impl WriteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteAction::Created => "created",
            WriteAction::Modified => "modified",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteOutcome {
    pub file_path: String,
    pub lines: usize,
    pub action: WriteAction,
}

/// Write `content` to `file_path` on behalf of `agent`.
///
/// Takes the hub lock for the path (failing with `LockHeld` if someone else
/// has it), announces the change to everyone, writes the file, records a
/// status update and releases the lock. The lock is released even when the
/// write itself fails.
pub fn write_file(
    hub: &CommunicationHub,
    agent: &str,
    file_path: &str,
    content: &str,
) -> Result<WriteOutcome> {
    if !hub.acquire_lock(agent, file_path)? {
        let holder = hub
            .lock_holder(file_path)?
            .unwrap_or_else(|| "unknown".to_string());
        return Err(HubError::LockHeld {
            path: file_path.to_string(),
            holder,
        });
    }

    let result = write_locked(hub, agent, file_path, content);
    let released = hub.release_file_lock(agent, file_path);

    let outcome = result?;
    released?;
    tracing::info!(agent, file_path, action = outcome.action.as_str(), "file written");
    Ok(outcome)
}

fn write_locked(
    hub: &CommunicationHub,
    agent: &str,
    file_path: &str,
    content: &str,
) -> Result<WriteOutcome> {
    let path = Path::new(file_path);
    let action = if path.exists() {
        WriteAction::Modified
    } else {
        WriteAction::Created
    };

    let (text, kind) = match action {
        WriteAction::Modified => (
            format!("Modifying existing file: {}", file_path),
            "file_modification",
        ),
        WriteAction::Created => (format!("Creating new file: {}", file_path), "file_creation"),
    };
    hub.send_message(agent, BROADCAST, &text, kind)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;

    let lines = content.split('\n').count();
    let mut details = Map::new();
    details.insert("file_path".to_string(), json!(file_path));
    details.insert("lines".to_string(), json!(lines));
    details.insert("action".to_string(), json!(action.as_str()));
    hub.update_status(agent, &format!("Created/Updated {}", file_path), Some(details))?;

    Ok(WriteOutcome {
        file_path: file_path.to_string(),
        lines,
        action,
    })
}

/// Ask `reviewer` to look at `file_path`
pub fn request_review(
    hub: &CommunicationHub,
    from: &str,
    file_path: &str,
    reviewer: &str,
) -> Result<()> {
    hub.send_message(
        from,
        reviewer,
        &format!("Please review {} - ready for code review", file_path),
        "code_review_request",
    )?;
    Ok(())
}

/// Record progress and tell everyone about it
pub fn share_progress(
    hub: &CommunicationHub,
    agent: &str,
    progress: &str,
    details: Option<Map<String, Value>>,
) -> Result<()> {
    hub.update_status(agent, progress, details)?;
    hub.send_message(
        agent,
        BROADCAST,
        &format!("Progress update: {}", progress),
        "progress",
    )?;
    Ok(())
}

/// Announce a component interface and let the integration desk know
pub fn register_interface(
    hub: &CommunicationHub,
    agent: &str,
    component: &str,
    interface: Value,
) -> Result<IntegrationPoint> {
    let point = hub.report_integration_point(agent, component, interface)?;
    let desk = hub.settings().integration_agent.clone();
    hub.send_message(
        agent,
        &desk,
        &format!("New interface registered: {}", component),
        "integration_point",
    )?;
    Ok(point)
}

/// Integration points that list `component` among their dependencies
pub fn dependents_of(hub: &CommunicationHub, component: &str) -> Result<Vec<IntegrationPoint>> {
    Ok(hub
        .integration_points()?
        .into_iter()
        .filter(|p| p.dependencies().contains(&component))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSummary {
    pub agent: String,
    pub status: String,
    pub timestamp: String,
}

/// Latest status of each agent seen in the last 20 updates, in order of
/// first appearance within that window
pub fn team_status(hub: &CommunicationHub) -> Result<Vec<AgentSummary>> {
    let updates = hub.agent_status(None)?;
    let window = &updates[updates.len().saturating_sub(20)..];

    let mut team: Vec<AgentSummary> = Vec::new();
    for update in window {
        let summary = AgentSummary {
            agent: update.agent.clone(),
            status: update.status.clone(),
            timestamp: update.timestamp.clone(),
        };
        match team.iter_mut().find(|s| s.agent == update.agent) {
            Some(existing) => *existing = summary,
            None => team.push(summary),
        }
    }
    Ok(team)
}

/// Currently locked files and their holders
pub fn file_status(hub: &CommunicationHub) -> Result<Vec<(String, FileLockEntry)>> {
    Ok(hub.file_locks()?.into_iter().collect())
}

/// The ten most recent integration points
pub fn integration_status(hub: &CommunicationHub) -> Result<Vec<IntegrationPoint>> {
    let points = hub.integration_points()?;
    let start = points.len().saturating_sub(10);
    Ok(points[start..].to_vec())
}
