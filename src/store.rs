//! The shared hub document and its on-disk persistence.
//!
//! All coordination state lives in one pretty-printed JSON file. Every read
//! and write takes an advisory `flock` on a sibling lock file so writers in
//! different processes are serialized, and saves go through a temp file plus
//! rename so a crash mid-write never leaves a truncated document behind.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Top-level keys every hub document must carry.
pub const REQUIRED_KEYS: [&str; 7] = [
    "communications",
    "status_updates",
    "shared_context",
    "file_locks",
    "file_lock_requests",
    "integration_points",
    "conflict_reports",
];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error in {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Lock error: {0}")]
    Lock(String),
}

/// A message from one agent to another (or to `all`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub timestamp: String,
    pub from_agent: String,
    pub to_agent: String,
    pub message: String,
    #[serde(rename = "type", default = "default_message_type")]
    pub kind: String,
    #[serde(default)]
    pub read: bool,
}

fn default_message_type() -> String {
    "info".to_string()
}

/// One entry in the bounded status history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub timestamp: String,
    pub agent: String,
    pub status: String,
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// Holder of an exclusive file lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLockEntry {
    pub agent: String,
    pub timestamp: String,
}

/// Lifecycle of a lock request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Denied => write!(f, "denied"),
        }
    }
}

/// A request for exclusive access that waits on the lock manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRequest {
    pub id: String,
    pub agent: String,
    pub file_path: String,
    pub status: RequestStatus,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_time: Option<String>,
}

/// A component interface announced by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationPoint {
    pub timestamp: String,
    pub agent: String,
    pub component: String,
    #[serde(default)]
    pub interface: Value,
}

impl IntegrationPoint {
    /// Names listed under `interface.dependencies`, ignoring non-string entries
    pub fn dependencies(&self) -> Vec<&str> {
        self.interface
            .get("dependencies")
            .and_then(|d| d.as_array())
            .map(|deps| deps.iter().filter_map(|d| d.as_str()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub id: String,
    pub timestamp: String,
    pub agent: String,
    pub details: String,
    #[serde(default)]
    pub resolved: bool,
}

/// The whole shared document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HubDocument {
    #[serde(default)]
    pub communications: Vec<Message>,
    #[serde(default)]
    pub status_updates: Vec<StatusUpdate>,
    #[serde(default)]
    pub shared_context: Map<String, Value>,
    #[serde(default)]
    pub file_locks: BTreeMap<String, FileLockEntry>,
    #[serde(default)]
    pub file_lock_requests: Vec<LockRequest>,
    #[serde(default)]
    pub integration_points: Vec<IntegrationPoint>,
    #[serde(default)]
    pub conflict_reports: Vec<ConflictReport>,
}

impl HubDocument {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Current time as an RFC 3339 string
pub fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Parse a document timestamp. RFC 3339 is what this crate writes; older
/// documents carry offset-less ISO 8601 local times (`2024-05-01T09:30:00.123456`),
/// which are read as local time.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(ts) {
        return Some(t.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

/// RAII guard for the store's advisory lock - released on drop
struct FileLock {
    #[cfg(unix)]
    file: File,
}

impl FileLock {
    #[cfg(unix)]
    fn acquire(lock_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        // LOCK_EX blocks until every other holder is gone
        let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if ret != 0 {
            return Err(StoreError::Lock(format!(
                "Failed to acquire lock on {:?}: {}",
                lock_path,
                std::io::Error::last_os_error()
            )));
        }

        Ok(FileLock { file })
    }

    #[cfg(not(unix))]
    fn acquire(lock_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(FileLock {})
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
    }
}

/// Lock file sitting next to the document, e.g. `hub.json.lock`
pub fn lock_path(store_path: &Path) -> PathBuf {
    let name = store_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "hub.json".to_string());
    store_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("{}.lock", name))
}

fn parse_document(path: &Path, content: &str) -> Result<HubDocument, StoreError> {
    serde_json::from_str(content).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read_unlocked(path: &Path) -> Result<HubDocument, StoreError> {
    let content = fs::read_to_string(path)?;
    parse_document(path, &content)
}

/// Temp file for an atomic save, e.g. `.hub.json.tmp.<pid>`
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "hub.json".to_string());
    path.parent()
        .unwrap_or(Path::new("."))
        .join(format!(".{}.tmp.{}", name, std::process::id()))
}

fn write_unlocked(doc: &HubDocument, path: &Path) -> Result<(), StoreError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;
    let tmp_path = temp_path(path);

    let result = (|| -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(doc).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            fs::rename(&tmp_path, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

/// Load the document under the store lock
pub fn load_document(path: &Path) -> Result<HubDocument, StoreError> {
    let _lock = FileLock::acquire(&lock_path(path))?;
    read_unlocked(path)
}

/// Save the document atomically under the store lock
pub fn save_document(doc: &HubDocument, path: &Path) -> Result<(), StoreError> {
    let _lock = FileLock::acquire(&lock_path(path))?;
    write_unlocked(doc, path)
}

/// Run a read-modify-write cycle while holding the store lock.
///
/// The document is written back only when `f` returns `Ok`.
pub fn with_document<T, E, F>(path: &Path, f: F) -> Result<T, E>
where
    E: From<StoreError>,
    F: FnOnce(&mut HubDocument) -> Result<T, E>,
{
    let _lock = FileLock::acquire(&lock_path(path))?;
    let mut doc = read_unlocked(path)?;
    let value = f(&mut doc)?;
    write_unlocked(&doc, path)?;
    Ok(value)
}

/// Make sure a usable document exists at `path`.
///
/// Creates an empty document when the file is missing, fills in any missing
/// top-level keys, and replaces an unreadable file with a fresh document
/// (the corrupt one is kept beside it with a `.corrupt` extension). Returns
/// true when a fresh document was written.
pub fn initialize(path: &Path) -> Result<bool, StoreError> {
    let _lock = FileLock::acquire(&lock_path(path))?;

    if !path.exists() {
        write_unlocked(&HubDocument::new(), path)?;
        tracing::info!(path = %path.display(), "created hub document");
        return Ok(true);
    }

    let content = fs::read_to_string(path)?;
    let raw: Map<String, Value> = match serde_json::from_str(&content) {
        Ok(Value::Object(map)) => map,
        other => {
            let reason = match other {
                Err(e) => e.to_string(),
                Ok(_) => "top-level value is not an object".to_string(),
            };
            return recover_corrupt(path, &reason);
        }
    };

    let missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| !raw.contains_key(*key))
        .collect();

    let doc = match serde_json::from_value::<HubDocument>(Value::Object(raw)) {
        Ok(doc) => doc,
        Err(e) => return recover_corrupt(path, &e.to_string()),
    };

    if !missing.is_empty() {
        for key in &missing {
            tracing::info!(key = %key, "added missing key to hub document");
        }
        write_unlocked(&doc, path)?;
    }

    Ok(false)
}

fn recover_corrupt(path: &Path, reason: &str) -> Result<bool, StoreError> {
    tracing::error!(path = %path.display(), reason, "hub document unreadable, recreating");
    let backup = path.with_extension("corrupt");
    fs::rename(path, &backup)?;
    write_unlocked(&HubDocument::new(), path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_initialize_creates_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared").join("hub.json");

        assert!(initialize(&path).unwrap());
        assert!(path.exists());

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        for key in REQUIRED_KEYS {
            assert!(raw.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hub.json");

        assert!(initialize(&path).unwrap());
        assert!(!initialize(&path).unwrap());
    }

    #[test]
    fn test_initialize_adds_missing_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hub.json");
        fs::write(
            &path,
            r#"{"communications":[{"id":"m1","timestamp":"2024-01-01T00:00:00Z","from_agent":"a","to_agent":"b","message":"hi","type":"info","read":false}]}"#,
        )
        .unwrap();

        assert!(!initialize(&path).unwrap());

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("file_locks").is_some());
        assert!(raw.get("conflict_reports").is_some());

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.communications.len(), 1);
        assert_eq!(doc.communications[0].message, "hi");
    }

    #[test]
    fn test_initialize_recovers_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hub.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(initialize(&path).unwrap());

        let doc = load_document(&path).unwrap();
        assert_eq!(doc, HubDocument::new());
        assert!(dir.path().join("hub.corrupt").exists());
    }

    #[test]
    fn test_initialize_recovers_non_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hub.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(initialize(&path).unwrap());
        assert_eq!(load_document(&path).unwrap(), HubDocument::new());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load_document(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn test_load_invalid_json_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hub.json");
        fs::write(&path, "garbage").unwrap();

        let err = load_document(&path).unwrap_err();
        match err {
            StoreError::Json { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected Json error, got {:?}", other),
        }
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hub.json");
        save_document(&HubDocument::new(), &path).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_temp_path_is_per_document() {
        let dir = TempDir::new().unwrap();
        let a = temp_path(&dir.path().join("a.json"));
        let b = temp_path(&dir.path().join("b.json"));
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(dir.path()));
        assert!(a.file_name().unwrap().to_string_lossy().starts_with(".a.json.tmp."));

        // Two documents in one directory saved back to back keep their own content
        let mut doc = HubDocument::new();
        doc.shared_context.insert("owner".to_string(), Value::from("b"));
        save_document(&HubDocument::new(), &dir.path().join("a.json")).unwrap();
        save_document(&doc, &dir.path().join("b.json")).unwrap();
        assert!(load_document(&dir.path().join("a.json")).unwrap().shared_context.is_empty());
        assert_eq!(load_document(&dir.path().join("b.json")).unwrap(), doc);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2024-01-01T10:00:00+02:00").unwrap();
        assert_eq!(rfc.to_rfc3339(), "2024-01-01T08:00:00+00:00");

        let naive = parse_timestamp("2024-01-01T10:00:00.123456").unwrap();
        assert_eq!(
            naive.with_timezone(&Local).naive_local().to_string(),
            "2024-01-01 10:00:00.123456"
        );
        assert!(parse_timestamp("2024-01-01T10:00:00").is_some());

        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_with_document_skips_write_on_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hub.json");
        initialize(&path).unwrap();

        let result: Result<(), StoreError> = with_document(&path, |doc| {
            doc.shared_context
                .insert("k".to_string(), Value::String("v".to_string()));
            Err(StoreError::Lock("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(load_document(&path).unwrap().shared_context.is_empty());
    }

    #[test]
    fn test_message_type_field_name() {
        let msg = Message {
            id: "m1".to_string(),
            timestamp: now(),
            from_agent: "a".to_string(),
            to_agent: "b".to_string(),
            message: "hello".to_string(),
            kind: "coordination".to_string(),
            read: false,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "coordination");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_integration_point_dependencies() {
        let point = IntegrationPoint {
            timestamp: now(),
            agent: "frontend".to_string(),
            component: "MainWindow".to_string(),
            interface: serde_json::json!({
                "methods": ["start_game"],
                "dependencies": ["GameEngine", 7, "ResourceManager"]
            }),
        };
        assert_eq!(point.dependencies(), vec!["GameEngine", "ResourceManager"]);

        let bare = IntegrationPoint {
            interface: Value::Null,
            ..point
        };
        assert!(bare.dependencies().is_empty());
    }

    #[test]
    fn test_lock_path_is_sibling() {
        let p = lock_path(Path::new("/tmp/x/hub.json"));
        assert_eq!(p, PathBuf::from("/tmp/x/hub.json.lock"));
    }
}
