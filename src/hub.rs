//! The coordination hub: messaging, status, shared context and file locks.
//!
//! Every public operation is one transaction on the shared document: take the
//! in-process mutex, take the store's file lock, read, mutate, write back.
//! Nothing here calls another locked operation, so the mutex never needs to
//! be re-entrant.

use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::config::HubConfig;
use crate::store::{
    self, ConflictReport, FileLockEntry, HubDocument, IntegrationPoint, LockRequest, Message,
    RequestStatus, StatusUpdate, StoreError,
};

/// Recipient name that addresses every agent
pub const BROADCAST: &str = "all";

#[derive(Error, Debug)]
pub enum HubError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Lock request '{0}' not found or already processed")]
    RequestNotFound(String),
    #[error("Conflict report '{0}' not found")]
    ConflictNotFound(String),
    #[error("'{path}' is locked by {holder}")]
    LockHeld { path: String, holder: String },
}

pub type Result<T> = std::result::Result<T, HubError>;

pub struct CommunicationHub {
    path: PathBuf,
    settings: HubConfig,
    guard: Mutex<()>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn new_message(from: &str, to: &str, text: &str, kind: &str) -> Message {
    Message {
        id: new_id(),
        timestamp: store::now(),
        from_agent: from.to_string(),
        to_agent: to.to_string(),
        message: text.to_string(),
        kind: kind.to_string(),
        read: false,
    }
}

/// First 50 characters, for log lines
fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(50).collect();
    if text.chars().count() > 50 {
        out.push_str("...");
    }
    out
}

impl CommunicationHub {
    /// Open (and if needed create or repair) the document at `path`
    pub fn open(path: impl Into<PathBuf>, settings: HubConfig) -> Result<Self> {
        let path = path.into();
        store::initialize(&path)?;
        Ok(Self {
            path,
            settings,
            guard: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &HubConfig {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // A panicking writer never leaves a half-written document behind,
        // so a poisoned guard is still safe to reuse.
        self.guard.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transact<T>(&self, f: impl FnOnce(&mut HubDocument) -> Result<T>) -> Result<T> {
        let _guard = self.lock();
        store::with_document(&self.path, f)
    }

    fn read<T>(&self, f: impl FnOnce(&HubDocument) -> T) -> Result<T> {
        let _guard = self.lock();
        let doc = store::load_document(&self.path)?;
        Ok(f(&doc))
    }

    /// Full copy of the current document
    pub fn snapshot(&self) -> Result<HubDocument> {
        self.read(|doc| doc.clone())
    }

    // --- messaging ---

    pub fn send_message(&self, from: &str, to: &str, message: &str, kind: &str) -> Result<Message> {
        let msg = new_message(from, to, message, kind);
        let stored = msg.clone();
        self.transact(move |doc| {
            doc.communications.push(stored);
            Ok(())
        })?;
        tracing::info!(from, to, kind, "message: {}", preview(message));
        Ok(msg)
    }

    /// Messages addressed to exactly `agent`, oldest first
    pub fn get_messages(&self, agent: &str, unread_only: bool) -> Result<Vec<Message>> {
        self.read(|doc| {
            doc.communications
                .iter()
                .filter(|m| m.to_agent == agent && (!unread_only || !m.read))
                .cloned()
                .collect()
        })
    }

    /// Messages addressed to everyone
    pub fn broadcasts(&self, unread_only: bool) -> Result<Vec<Message>> {
        self.get_messages(BROADCAST, unread_only)
    }

    /// Returns false when no message has that id
    pub fn mark_message_read(&self, id: &str) -> Result<bool> {
        self.transact(|doc| {
            Ok(match doc.communications.iter_mut().find(|m| m.id == id) {
                Some(msg) => {
                    msg.read = true;
                    true
                }
                None => false,
            })
        })
    }

    // --- status ---

    pub fn update_status(
        &self,
        agent: &str,
        status: &str,
        details: Option<Map<String, Value>>,
    ) -> Result<StatusUpdate> {
        let update = StatusUpdate {
            timestamp: store::now(),
            agent: agent.to_string(),
            status: status.to_string(),
            details: details.unwrap_or_default(),
        };
        let limit = self.settings.status_history;
        let stored = update.clone();
        self.transact(move |doc| {
            doc.status_updates.push(stored);
            let len = doc.status_updates.len();
            if len > limit {
                doc.status_updates.drain(..len - limit);
            }
            Ok(())
        })?;
        tracing::info!(agent, "status: {}", status);
        Ok(update)
    }

    /// Status history for one agent, or for everyone when `agent` is None
    pub fn agent_status(&self, agent: Option<&str>) -> Result<Vec<StatusUpdate>> {
        self.read(|doc| match agent {
            Some(name) => doc
                .status_updates
                .iter()
                .filter(|s| s.agent == name)
                .cloned()
                .collect(),
            None => doc.status_updates.clone(),
        })
    }

    /// Most recent status per agent
    pub fn latest_status(&self) -> Result<BTreeMap<String, StatusUpdate>> {
        self.read(|doc| latest_by_agent(&doc.status_updates))
    }

    // --- shared context ---

    pub fn update_shared_context(&self, key: &str, value: Value) -> Result<()> {
        self.transact(|doc| {
            doc.shared_context.insert(key.to_string(), value);
            Ok(())
        })?;
        tracing::info!(key, "updated shared context");
        Ok(())
    }

    pub fn shared_context(&self, key: &str) -> Result<Option<Value>> {
        self.read(|doc| doc.shared_context.get(key).cloned())
    }

    pub fn all_shared_context(&self) -> Result<Map<String, Value>> {
        self.read(|doc| doc.shared_context.clone())
    }

    // --- file locks ---

    /// Take an exclusive lock on `file_path`. Returns false if anyone,
    /// including `agent` itself, already holds it.
    pub fn acquire_lock(&self, agent: &str, file_path: &str) -> Result<bool> {
        let acquired = self.transact(|doc| {
            if doc.file_locks.contains_key(file_path) {
                return Ok(false);
            }
            doc.file_locks.insert(
                file_path.to_string(),
                FileLockEntry {
                    agent: agent.to_string(),
                    timestamp: store::now(),
                },
            );
            Ok(true)
        })?;
        if acquired {
            tracing::info!(agent, file_path, "lock acquired");
        } else {
            tracing::debug!(agent, file_path, "lock busy");
        }
        Ok(acquired)
    }

    /// Alias of [`acquire_lock`](Self::acquire_lock)
    pub fn request_file_lock(&self, agent: &str, file_path: &str) -> Result<bool> {
        self.acquire_lock(agent, file_path)
    }

    /// Release a lock held by `agent`. A release by anyone else, or of a
    /// path that isn't locked, changes nothing and returns false.
    pub fn release_file_lock(&self, agent: &str, file_path: &str) -> Result<bool> {
        let released = self.transact(|doc| {
            let is_holder = doc
                .file_locks
                .get(file_path)
                .is_some_and(|entry| entry.agent == agent);
            if is_holder {
                doc.file_locks.remove(file_path);
            }
            Ok(is_holder)
        })?;
        if released {
            tracing::info!(agent, file_path, "lock released");
        } else {
            tracing::warn!(agent, file_path, "release refused: not the holder");
        }
        Ok(released)
    }

    /// Remove a lock regardless of who holds it; returns the old holder
    pub fn force_release(&self, file_path: &str) -> Result<Option<FileLockEntry>> {
        let removed = self.transact(|doc| Ok(doc.file_locks.remove(file_path)))?;
        if let Some(entry) = &removed {
            tracing::warn!(file_path, holder = %entry.agent, "lock broken");
        }
        Ok(removed)
    }

    pub fn lock_holder(&self, file_path: &str) -> Result<Option<String>> {
        self.read(|doc| doc.file_locks.get(file_path).map(|e| e.agent.clone()))
    }

    pub fn is_locked(&self, file_path: &str) -> Result<bool> {
        self.read(|doc| doc.file_locks.contains_key(file_path))
    }

    pub fn file_locks(&self) -> Result<BTreeMap<String, FileLockEntry>> {
        self.read(|doc| doc.file_locks.clone())
    }

    /// Locks held longer than `max_age`. Entries with unreadable
    /// timestamps count as stale. An age reaching back before the earliest
    /// representable time matches nothing.
    pub fn stale_locks(&self, max_age: Duration) -> Result<Vec<(String, FileLockEntry)>> {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            return Ok(Vec::new());
        };
        self.read(|doc| {
            doc.file_locks
                .iter()
                .filter(|(_, entry)| {
                    store::parse_timestamp(&entry.timestamp).is_none_or(|t| t < cutoff)
                })
                .map(|(path, entry)| (path.clone(), entry.clone()))
                .collect()
        })
    }

    // --- lock approval ---

    /// Queue a request for the lock manager to approve or deny
    pub fn request_lock_approval(&self, agent: &str, file_path: &str) -> Result<LockRequest> {
        let request = LockRequest {
            id: new_id(),
            agent: agent.to_string(),
            file_path: file_path.to_string(),
            status: RequestStatus::Pending,
            timestamp: store::now(),
            approval_time: None,
            denial_reason: None,
            denial_time: None,
        };
        let stored = request.clone();
        self.transact(move |doc| {
            doc.file_lock_requests.push(stored);
            Ok(())
        })?;
        tracing::info!(agent, file_path, id = %request.id, "lock approval requested");
        Ok(request)
    }

    pub fn pending_requests(&self) -> Result<Vec<LockRequest>> {
        self.read(|doc| {
            doc.file_lock_requests
                .iter()
                .filter(|r| r.status == RequestStatus::Pending)
                .cloned()
                .collect()
        })
    }

    pub fn lock_requests(&self) -> Result<Vec<LockRequest>> {
        self.read(|doc| doc.file_lock_requests.clone())
    }

    /// Approve a pending request: grant the lock to the requester and tell
    /// them. Fails with `LockHeld` (request stays pending) when another
    /// agent holds the path.
    pub fn approve_request(&self, id: &str) -> Result<LockRequest> {
        let manager = self.settings.lock_manager.clone();
        let approved = self.transact(|doc| {
            let idx = pending_index(doc, id)?;
            grant(doc, idx, &manager)?;
            Ok(doc.file_lock_requests[idx].clone())
        })?;
        tracing::info!(agent = %approved.agent, file_path = %approved.file_path, "lock request approved");
        Ok(approved)
    }

    pub fn deny_request(&self, id: &str, reason: Option<&str>) -> Result<LockRequest> {
        let manager = self.settings.lock_manager.clone();
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Denied by {}", manager));
        let denied = self.transact(|doc| {
            let idx = pending_index(doc, id)?;
            let request = &mut doc.file_lock_requests[idx];
            request.status = RequestStatus::Denied;
            request.denial_reason = Some(reason.clone());
            request.denial_time = Some(store::now());
            let request = request.clone();
            doc.communications.push(new_message(
                &manager,
                &request.agent,
                &format!("File lock denied for {}: {}", request.file_path, reason),
                "file_lock_denial",
            ));
            Ok(request)
        })?;
        tracing::info!(agent = %denied.agent, file_path = %denied.file_path, "lock request denied");
        Ok(denied)
    }

    /// Approve every pending request whose path is free, oldest first.
    /// Requests for held paths stay pending.
    pub fn approve_all(&self) -> Result<Vec<LockRequest>> {
        let manager = self.settings.lock_manager.clone();
        let approved = self.transact(|doc| {
            let pending: Vec<usize> = doc
                .file_lock_requests
                .iter()
                .enumerate()
                .filter(|(_, r)| r.status == RequestStatus::Pending)
                .map(|(i, _)| i)
                .collect();

            let mut approved = Vec::new();
            for idx in pending {
                match grant(doc, idx, &manager) {
                    Ok(()) => approved.push(doc.file_lock_requests[idx].clone()),
                    Err(HubError::LockHeld { .. }) => continue,
                    Err(e) => return Err(e),
                }
            }
            Ok(approved)
        })?;
        tracing::info!(count = approved.len(), "approved pending lock requests");
        Ok(approved)
    }

    // --- integration & conflicts ---

    pub fn report_integration_point(
        &self,
        agent: &str,
        component: &str,
        interface: Value,
    ) -> Result<IntegrationPoint> {
        let point = IntegrationPoint {
            timestamp: store::now(),
            agent: agent.to_string(),
            component: component.to_string(),
            interface,
        };
        let stored = point.clone();
        self.transact(move |doc| {
            doc.integration_points.push(stored);
            Ok(())
        })?;
        tracing::info!(agent, component, "integration point reported");
        Ok(point)
    }

    pub fn integration_points(&self) -> Result<Vec<IntegrationPoint>> {
        self.read(|doc| doc.integration_points.clone())
    }

    /// Record a conflict and notify the integration agent
    pub fn report_conflict(&self, agent: &str, details: &str) -> Result<ConflictReport> {
        let report = ConflictReport {
            id: new_id(),
            timestamp: store::now(),
            agent: agent.to_string(),
            details: details.to_string(),
            resolved: false,
        };
        let notice = new_message(
            agent,
            &self.settings.integration_agent,
            &format!("CONFLICT DETECTED: {}", details),
            "conflict",
        );
        let stored = report.clone();
        self.transact(move |doc| {
            doc.conflict_reports.push(stored);
            doc.communications.push(notice);
            Ok(())
        })?;
        tracing::warn!(agent, "conflict reported: {}", preview(details));
        Ok(report)
    }

    pub fn conflicts(&self, open_only: bool) -> Result<Vec<ConflictReport>> {
        self.read(|doc| {
            doc.conflict_reports
                .iter()
                .filter(|c| !open_only || !c.resolved)
                .cloned()
                .collect()
        })
    }

    pub fn resolve_conflict(&self, id: &str) -> Result<ConflictReport> {
        self.transact(|doc| {
            let report = doc
                .conflict_reports
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| HubError::ConflictNotFound(id.to_string()))?;
            report.resolved = true;
            Ok(report.clone())
        })
    }
}

/// Most recent entry per agent from a status history
pub fn latest_by_agent(updates: &[StatusUpdate]) -> BTreeMap<String, StatusUpdate> {
    let mut latest = BTreeMap::new();
    for update in updates {
        latest.insert(update.agent.clone(), update.clone());
    }
    latest
}

fn pending_index(doc: &HubDocument, id: &str) -> Result<usize> {
    doc.file_lock_requests
        .iter()
        .position(|r| r.id == id && r.status == RequestStatus::Pending)
        .ok_or_else(|| HubError::RequestNotFound(id.to_string()))
}

/// Approve request `idx`: take the lock for its agent and queue the notice
fn grant(doc: &mut HubDocument, idx: usize, manager: &str) -> Result<()> {
    let agent = doc.file_lock_requests[idx].agent.clone();
    let file_path = doc.file_lock_requests[idx].file_path.clone();

    if let Some(entry) = doc.file_locks.get(&file_path)
        && entry.agent != agent
    {
        return Err(HubError::LockHeld {
            path: file_path,
            holder: entry.agent.clone(),
        });
    }

    let now = store::now();
    doc.file_locks.insert(
        file_path.clone(),
        FileLockEntry {
            agent: agent.clone(),
            timestamp: now.clone(),
        },
    );
    let request = &mut doc.file_lock_requests[idx];
    request.status = RequestStatus::Approved;
    request.approval_time = Some(now);

    doc.communications.push(new_message(
        manager,
        &agent,
        &format!("File lock approved for {}", file_path),
        "file_lock_approval",
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_hub(dir: &TempDir) -> CommunicationHub {
        CommunicationHub::open(dir.path().join("hub.json"), HubConfig::default()).unwrap()
    }

    #[test]
    fn test_open_creates_document() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);
        assert!(hub.path().exists());
        assert_eq!(hub.snapshot().unwrap(), HubDocument::new());
    }

    #[test]
    fn test_message_reaches_inbox() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        hub.send_message("frontend", "backend", "Starting main_window", "info")
            .unwrap();
        hub.send_message("backend", "frontend", "Working on engine", "info")
            .unwrap();

        let inbox = hub.get_messages("backend", true).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].from_agent, "frontend");
        assert_eq!(inbox[0].message, "Starting main_window");
        assert!(!inbox[0].read);
    }

    #[test]
    fn test_mark_read_hides_from_unread_view() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        let msg = hub.send_message("a", "b", "hello", "info").unwrap();
        assert!(hub.mark_message_read(&msg.id).unwrap());

        assert!(hub.get_messages("b", true).unwrap().is_empty());
        let all = hub.get_messages("b", false).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].read);
    }

    #[test]
    fn test_mark_unknown_message() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);
        assert!(!hub.mark_message_read("missing").unwrap());
    }

    #[test]
    fn test_broadcasts_are_separate_from_inbox() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        hub.send_message("integration", BROADCAST, "sync up", "coordination")
            .unwrap();

        assert!(hub.get_messages("frontend", true).unwrap().is_empty());
        let b = hub.broadcasts(true).unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].kind, "coordination");
    }

    #[test]
    fn test_status_history_is_capped() {
        let dir = TempDir::new().unwrap();
        let settings = HubConfig {
            status_history: 5,
            ..HubConfig::default()
        };
        let hub = CommunicationHub::open(dir.path().join("hub.json"), settings).unwrap();

        for i in 0..8 {
            hub.update_status("worker", &format!("step {}", i), None)
                .unwrap();
        }

        let history = hub.agent_status(None).unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history.first().unwrap().status, "step 3");
        assert_eq!(history.last().unwrap().status, "step 7");
    }

    #[test]
    fn test_default_status_history_is_fifty() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);
        for i in 0..55 {
            hub.update_status("w", &i.to_string(), None).unwrap();
        }
        let history = hub.agent_status(None).unwrap();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].status, "5");
    }

    #[test]
    fn test_agent_status_filter_and_latest() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        let mut details = Map::new();
        details.insert("progress".to_string(), json!("25%"));
        hub.update_status("frontend", "layout", Some(details)).unwrap();
        hub.update_status("backend", "engine", None).unwrap();
        hub.update_status("frontend", "widgets", None).unwrap();

        let fe = hub.agent_status(Some("frontend")).unwrap();
        assert_eq!(fe.len(), 2);
        assert_eq!(fe[0].details["progress"], "25%");

        let latest = hub.latest_status().unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest["frontend"].status, "widgets");
        assert_eq!(latest["backend"].status, "engine");
    }

    #[test]
    fn test_shared_context() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        hub.update_shared_context("theme", json!("dark")).unwrap();
        hub.update_shared_context("theme", json!({"name": "light"}))
            .unwrap();

        assert_eq!(
            hub.shared_context("theme").unwrap(),
            Some(json!({"name": "light"}))
        );
        assert_eq!(hub.shared_context("missing").unwrap(), None);
        assert_eq!(hub.all_shared_context().unwrap().len(), 1);
    }

    #[test]
    fn test_released_lock_can_be_reacquired_by_another() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);
        let file = "Game/frontend/main_window.py";

        assert!(hub.acquire_lock("alice", file).unwrap());
        assert!(!hub.acquire_lock("bob", file).unwrap());
        assert_eq!(hub.lock_holder(file).unwrap().as_deref(), Some("alice"));

        assert!(hub.release_file_lock("alice", file).unwrap());
        assert!(!hub.is_locked(file).unwrap());

        assert!(hub.acquire_lock("bob", file).unwrap());
        assert_eq!(hub.lock_holder(file).unwrap().as_deref(), Some("bob"));
    }

    #[test]
    fn test_same_agent_cannot_double_acquire() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);
        assert!(hub.request_file_lock("alice", "f").unwrap());
        assert!(!hub.request_file_lock("alice", "f").unwrap());
    }

    #[test]
    fn test_release_requires_holder() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        hub.acquire_lock("alice", "f").unwrap();
        assert!(!hub.release_file_lock("bob", "f").unwrap());
        assert_eq!(hub.lock_holder("f").unwrap().as_deref(), Some("alice"));

        assert!(!hub.release_file_lock("alice", "not-locked").unwrap());
    }

    #[test]
    fn test_force_release() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        hub.acquire_lock("alice", "f").unwrap();
        let old = hub.force_release("f").unwrap().unwrap();
        assert_eq!(old.agent, "alice");
        assert!(hub.force_release("f").unwrap().is_none());
        assert!(hub.file_locks().unwrap().is_empty());
    }

    #[test]
    fn test_stale_locks() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        hub.acquire_lock("alice", "fresh").unwrap();
        store::with_document::<_, HubError, _>(hub.path(), |doc| {
            doc.file_locks.insert(
                "old".to_string(),
                FileLockEntry {
                    agent: "bob".to_string(),
                    timestamp: "2020-01-01T00:00:00+00:00".to_string(),
                },
            );
            Ok(())
        })
        .unwrap();

        let stale = hub.stale_locks(Duration::minutes(30)).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].0, "old");
    }

    fn set_lock_timestamp(hub: &CommunicationHub, path: &str, timestamp: &str) {
        store::with_document::<_, HubError, _>(hub.path(), |doc| {
            doc.file_locks.insert(
                path.to_string(),
                FileLockEntry {
                    agent: "bob".to_string(),
                    timestamp: timestamp.to_string(),
                },
            );
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_stale_locks_reads_offsetless_and_flags_garbage() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        let recent_local = chrono::Local::now()
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();
        set_lock_timestamp(&hub, "recent_local", &recent_local);
        set_lock_timestamp(&hub, "old_local", "2020-01-01T00:00:00.000001");
        set_lock_timestamp(&hub, "garbage", "not a time");

        let stale: Vec<String> = hub
            .stale_locks(Duration::minutes(30))
            .unwrap()
            .into_iter()
            .map(|(path, _)| path)
            .collect();
        assert_eq!(stale, vec!["garbage".to_string(), "old_local".to_string()]);
    }

    #[test]
    fn test_stale_locks_with_out_of_range_age() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);
        set_lock_timestamp(&hub, "old", "2020-01-01T00:00:00+00:00");
        set_lock_timestamp(&hub, "garbage", "not a time");

        let stale = hub
            .stale_locks(Duration::minutes(100_000_000_000_000))
            .unwrap();
        assert!(stale.is_empty());
    }

    #[test]
    fn test_approve_grants_lock_and_notifies() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        let req = hub.request_lock_approval("frontend", "ui.py").unwrap();
        assert_eq!(req.status, RequestStatus::Pending);
        assert!(!hub.is_locked("ui.py").unwrap());
        assert_eq!(hub.pending_requests().unwrap().len(), 1);

        let approved = hub.approve_request(&req.id).unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(approved.approval_time.is_some());
        assert_eq!(hub.lock_holder("ui.py").unwrap().as_deref(), Some("frontend"));
        assert!(hub.pending_requests().unwrap().is_empty());

        let inbox = hub.get_messages("frontend", true).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, "file_lock_approval");
        assert_eq!(inbox[0].from_agent, "File Lock Manager");
    }

    #[test]
    fn test_request_transitions_once() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        let req = hub.request_lock_approval("frontend", "ui.py").unwrap();
        hub.approve_request(&req.id).unwrap();

        assert!(matches!(
            hub.approve_request(&req.id),
            Err(HubError::RequestNotFound(_))
        ));
        assert!(matches!(
            hub.deny_request(&req.id, None),
            Err(HubError::RequestNotFound(_))
        ));
    }

    #[test]
    fn test_deny_records_reason_and_notifies() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        let req = hub.request_lock_approval("qa", "tests.py").unwrap();
        let denied = hub.deny_request(&req.id, None).unwrap();
        assert_eq!(denied.status, RequestStatus::Denied);
        assert_eq!(
            denied.denial_reason.as_deref(),
            Some("Denied by File Lock Manager")
        );
        assert!(!hub.is_locked("tests.py").unwrap());

        let inbox = hub.get_messages("qa", true).unwrap();
        assert_eq!(inbox[0].kind, "file_lock_denial");
        assert!(inbox[0].message.contains("Denied by File Lock Manager"));
    }

    #[test]
    fn test_blank_denial_reason_uses_default() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        for blank in ["", "   "] {
            let req = hub.request_lock_approval("qa", "tests.py").unwrap();
            let denied = hub.deny_request(&req.id, Some(blank)).unwrap();
            assert_eq!(
                denied.denial_reason.as_deref(),
                Some("Denied by File Lock Manager")
            );
        }

        let req = hub.request_lock_approval("qa", "tests.py").unwrap();
        let denied = hub.deny_request(&req.id, Some("frozen")).unwrap();
        assert_eq!(denied.denial_reason.as_deref(), Some("frozen"));
    }

    #[test]
    fn test_approve_fails_when_held_by_other() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        hub.acquire_lock("backend", "shared.py").unwrap();
        let req = hub.request_lock_approval("frontend", "shared.py").unwrap();

        match hub.approve_request(&req.id) {
            Err(HubError::LockHeld { holder, .. }) => assert_eq!(holder, "backend"),
            other => panic!("expected LockHeld, got {:?}", other),
        }
        assert_eq!(hub.pending_requests().unwrap().len(), 1);
        assert!(hub.get_messages("frontend", true).unwrap().is_empty());
    }

    #[test]
    fn test_approve_all_skips_contended_paths() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        let first = hub.request_lock_approval("a", "x.py").unwrap();
        let second = hub.request_lock_approval("b", "x.py").unwrap();
        let third = hub.request_lock_approval("c", "y.py").unwrap();

        let approved = hub.approve_all().unwrap();
        let ids: Vec<&str> = approved.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), third.id.as_str()]);

        let pending = hub.pending_requests().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);
        assert_eq!(hub.lock_holder("x.py").unwrap().as_deref(), Some("a"));
        assert_eq!(hub.lock_holder("y.py").unwrap().as_deref(), Some("c"));
    }

    #[test]
    fn test_approve_all_with_nothing_pending() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);
        assert!(hub.approve_all().unwrap().is_empty());
    }

    #[test]
    fn test_integration_points() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        hub.report_integration_point(
            "frontend",
            "MainWindow",
            json!({"dependencies": ["GameEngine"]}),
        )
        .unwrap();

        let points = hub.integration_points().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].dependencies(), vec!["GameEngine"]);
    }

    #[test]
    fn test_conflict_report_and_resolve() {
        let dir = TempDir::new().unwrap();
        let hub = open_hub(&dir);

        let report = hub.report_conflict("frontend", "two resource APIs").unwrap();
        let inbox = hub.get_messages("integration_agent", true).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, "conflict");
        assert_eq!(inbox[0].message, "CONFLICT DETECTED: two resource APIs");

        assert_eq!(hub.conflicts(true).unwrap().len(), 1);
        hub.resolve_conflict(&report.id).unwrap();
        assert!(hub.conflicts(true).unwrap().is_empty());
        assert_eq!(hub.conflicts(false).unwrap().len(), 1);

        assert!(matches!(
            hub.resolve_conflict("nope"),
            Err(HubError::ConflictNotFound(_))
        ));
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(60);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 53);
        assert_eq!(preview("short"), "short");
    }
}
