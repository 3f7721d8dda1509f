//! Aggregate statistics over a hub document, shared by `hub stats` and the
//! terminal dashboard.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::store::{HubDocument, RequestStatus, parse_timestamp};

/// Number of most recent messages the average response time looks at
const RESPONSE_WINDOW: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentActivity {
    pub messages_sent: usize,
    pub files_created: usize,
    pub files_modified: usize,
    pub last_activity: Option<String>,
}

/// Messages and distinct active agents within one UTC hour
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyActivity {
    /// `YYYY-MM-DD HH:00`, UTC
    pub hour: String,
    pub messages: usize,
    pub agents_active: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HubStats {
    pub total_messages: usize,
    pub unread_messages: usize,
    pub messages_by_type: BTreeMap<String, usize>,
    pub agents: BTreeMap<String, AgentActivity>,
    /// Agents that have posted at least one status update
    pub active_agents: usize,
    pub lock_requests: usize,
    pub lock_approvals: usize,
    pub lock_denials: usize,
    pub pending_requests: usize,
    pub locked_files: usize,
    pub integration_points: usize,
    pub open_conflicts: usize,
    pub files_created: usize,
    pub files_modified: usize,
    pub context_keys: usize,
    pub session_seconds: i64,
    pub messages_per_minute: f64,
    /// Mean gap in seconds between consecutive recent messages
    pub avg_response_time: f64,
    /// Oldest hour first
    pub hourly_activity: Vec<HourlyActivity>,
}

/// Keep whichever timestamp is later; unparseable ones lose
fn later(current: &mut Option<String>, candidate: &str) {
    let newer = match current.as_deref() {
        None => true,
        Some(existing) => match (parse_timestamp(existing), parse_timestamp(candidate)) {
            (Some(a), Some(b)) => b > a,
            (None, Some(_)) => true,
            _ => false,
        },
    };
    if newer {
        *current = Some(candidate.to_string());
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The oldest message or status update on record
pub fn session_start(doc: &HubDocument) -> Option<DateTime<Utc>> {
    doc.communications
        .iter()
        .map(|m| m.timestamp.as_str())
        .chain(doc.status_updates.iter().map(|s| s.timestamp.as_str()))
        .filter_map(parse_timestamp)
        .min()
}

/// Mean gap between consecutive messages among the last few. Pairs with an
/// unreadable timestamp are skipped; 0 when there is no pair to measure.
fn avg_response_time(doc: &HubDocument) -> f64 {
    let start = doc.communications.len().saturating_sub(RESPONSE_WINDOW);
    let gaps: Vec<f64> = doc.communications[start..]
        .windows(2)
        .filter_map(|pair| {
            let prev = parse_timestamp(&pair[0].timestamp)?;
            let curr = parse_timestamp(&pair[1].timestamp)?;
            Some((curr - prev).num_milliseconds() as f64 / 1000.0)
        })
        .collect();
    if gaps.is_empty() {
        return 0.0;
    }
    round2(gaps.iter().sum::<f64>() / gaps.len() as f64)
}

fn hourly_activity(doc: &HubDocument) -> Vec<HourlyActivity> {
    let mut hours: BTreeMap<String, (usize, BTreeSet<&str>)> = BTreeMap::new();
    let hour_of = |ts: &str| parse_timestamp(ts).map(|t| t.format("%Y-%m-%d %H:00").to_string());

    for msg in &doc.communications {
        if let Some(hour) = hour_of(&msg.timestamp) {
            let bucket = hours.entry(hour).or_default();
            bucket.0 += 1;
            bucket.1.insert(&msg.from_agent);
        }
    }
    for update in &doc.status_updates {
        if let Some(hour) = hour_of(&update.timestamp) {
            hours.entry(hour).or_default().1.insert(&update.agent);
        }
    }

    hours
        .into_iter()
        .map(|(hour, (messages, agents))| HourlyActivity {
            hour,
            messages,
            agents_active: agents.len(),
        })
        .collect()
}

impl HubStats {
    /// Compute statistics for `doc`, measuring the session from `session_start`
    pub fn collect(doc: &HubDocument, session_start: DateTime<Utc>) -> Self {
        let mut stats = HubStats {
            total_messages: doc.communications.len(),
            locked_files: doc.file_locks.len(),
            integration_points: doc.integration_points.len(),
            lock_requests: doc.file_lock_requests.len(),
            context_keys: doc.shared_context.len(),
            avg_response_time: avg_response_time(doc),
            hourly_activity: hourly_activity(doc),
            ..Self::default()
        };

        for msg in &doc.communications {
            if !msg.read {
                stats.unread_messages += 1;
            }
            *stats.messages_by_type.entry(msg.kind.clone()).or_insert(0) += 1;
            let activity = stats.agents.entry(msg.from_agent.clone()).or_default();
            activity.messages_sent += 1;
            later(&mut activity.last_activity, &msg.timestamp);
        }

        let mut reporting = BTreeSet::new();
        for update in &doc.status_updates {
            reporting.insert(update.agent.as_str());
            let activity = stats.agents.entry(update.agent.clone()).or_default();
            later(&mut activity.last_activity, &update.timestamp);
            match update.details.get("action").and_then(|a| a.as_str()) {
                Some("created") => {
                    activity.files_created += 1;
                    stats.files_created += 1;
                }
                Some("modified") => {
                    activity.files_modified += 1;
                    stats.files_modified += 1;
                }
                _ => {}
            }
        }
        stats.active_agents = reporting.len();

        for request in &doc.file_lock_requests {
            match request.status {
                RequestStatus::Pending => stats.pending_requests += 1,
                RequestStatus::Approved => stats.lock_approvals += 1,
                RequestStatus::Denied => stats.lock_denials += 1,
            }
        }

        stats.open_conflicts = doc.conflict_reports.iter().filter(|c| !c.resolved).count();

        let elapsed = (Utc::now() - session_start).num_seconds().max(0);
        stats.session_seconds = elapsed;
        let minutes = (elapsed as f64 / 60.0).max(1.0);
        stats.messages_per_minute = round2(stats.total_messages as f64 / minutes);

        stats
    }

    /// Session length as `H:MM:SS`
    pub fn session_duration(&self) -> String {
        let s = self.session_seconds;
        format!("{}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
    }
}
