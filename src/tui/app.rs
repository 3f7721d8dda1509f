use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use agenthub::{
    CommunicationHub, Config, FileLockEntry, HubDocument, HubStats, LockRequest, Message,
    StatusUpdate,
};

/// How long a newly arrived message stays highlighted
const HIGHLIGHT_DURATION: Duration = Duration::from_secs(3);

/// Which panel has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Agents,
    Messages,
    Locks,
}

impl Panel {
    fn next(self) -> Self {
        match self {
            Panel::Agents => Panel::Messages,
            Panel::Messages => Panel::Locks,
            Panel::Locks => Panel::Agents,
        }
    }

    fn prev(self) -> Self {
        match self {
            Panel::Agents => Panel::Locks,
            Panel::Messages => Panel::Agents,
            Panel::Locks => Panel::Messages,
        }
    }
}

/// A row in the locks panel: either a held lock or a pending request
#[derive(Debug, Clone, PartialEq)]
pub enum LockRow {
    Held { path: String, entry: FileLockEntry },
    Pending(LockRequest),
}

pub struct App {
    pub hub_dir: PathBuf,
    hub: Option<CommunicationHub>,
    recent_limit: usize,

    pub selected_panel: Panel,
    pub agent_selected: usize,
    pub message_selected: usize,
    pub lock_selected: usize,

    pub should_quit: bool,
    pub show_help: bool,

    /// Latest status per agent, sorted by agent name
    pub agents: Vec<StatusUpdate>,
    /// Most recent messages, newest first
    pub messages: Vec<Message>,
    pub locks: Vec<LockRow>,
    pub stats: HubStats,

    /// Set when the last refresh failed; the previous data stays on screen
    pub load_error: Option<String>,

    pub highlighted_messages: HashMap<String, Instant>,
    prev_message_ids: HashSet<String>,
    session_start: chrono::DateTime<chrono::Utc>,

    pub last_refresh: Instant,
    pub last_refresh_display: String,
    pub poll_interval: Duration,
    first_load: bool,
}

impl App {
    pub fn new(hub_dir: PathBuf, poll_interval: Duration) -> Self {
        let config = Config::load(&hub_dir).unwrap_or_default();
        let (hub, load_error) =
            match CommunicationHub::open(config.store_path(&hub_dir), config.hub.clone()) {
                Ok(hub) => (Some(hub), None),
                Err(e) => (None, Some(e.to_string())),
            };

        let mut app = Self {
            hub_dir,
            hub,
            recent_limit: config.dashboard.recent_messages,
            selected_panel: Panel::Agents,
            agent_selected: 0,
            message_selected: 0,
            lock_selected: 0,
            should_quit: false,
            show_help: false,
            agents: Vec::new(),
            messages: Vec::new(),
            locks: Vec::new(),
            stats: HubStats::default(),
            load_error,
            highlighted_messages: HashMap::new(),
            prev_message_ids: HashSet::new(),
            session_start: chrono::Utc::now(),
            last_refresh: Instant::now(),
            last_refresh_display: String::from("--:--:--"),
            poll_interval,
            first_load: true,
        };
        app.refresh_all();
        app
    }

    pub fn maybe_refresh(&mut self) {
        if self.last_refresh.elapsed() >= self.poll_interval {
            self.refresh_all();
        }
    }

    /// Reload the hub document and rebuild every panel
    pub fn refresh_all(&mut self) {
        let snapshot = match self.hub.as_ref().map(|hub| hub.snapshot()) {
            Some(Ok(doc)) => Some(doc),
            Some(Err(e)) => {
                self.load_error = Some(e.to_string());
                None
            }
            None => None,
        };

        if let Some(doc) = snapshot {
            self.load_error = None;
            self.apply(&doc);
        }

        let now = Instant::now();
        self.highlighted_messages
            .retain(|_, t| now.duration_since(*t) < HIGHLIGHT_DURATION);

        self.last_refresh = Instant::now();
        self.last_refresh_display = chrono::Local::now().format("%H:%M:%S").to_string();
        self.first_load = false;
    }

    fn apply(&mut self, doc: &HubDocument) {
        self.agents = agenthub::hub::latest_by_agent(&doc.status_updates)
            .into_values()
            .collect();

        let start = doc.communications.len().saturating_sub(self.recent_limit);
        self.messages = doc.communications[start..].iter().rev().cloned().collect();

        let now = Instant::now();
        for msg in &self.messages {
            if !self.first_load && !self.prev_message_ids.contains(&msg.id) {
                self.highlighted_messages.insert(msg.id.clone(), now);
            }
        }
        self.prev_message_ids = doc.communications.iter().map(|m| m.id.clone()).collect();

        self.locks = doc
            .file_locks
            .iter()
            .map(|(path, entry)| LockRow::Held {
                path: path.clone(),
                entry: entry.clone(),
            })
            .chain(
                doc.file_lock_requests
                    .iter()
                    .filter(|r| r.status == agenthub::RequestStatus::Pending)
                    .cloned()
                    .map(LockRow::Pending),
            )
            .collect();

        if let Some(first) = agenthub::stats::session_start(doc) {
            self.session_start = first;
        }
        self.stats = HubStats::collect(doc, self.session_start);

        self.agent_selected = clamp(self.agent_selected, self.agents.len());
        self.message_selected = clamp(self.message_selected, self.messages.len());
        self.lock_selected = clamp(self.lock_selected, self.locks.len());
    }

    pub fn is_message_highlighted(&self, id: &str) -> bool {
        self.highlighted_messages.contains_key(id)
    }

    pub fn next_panel(&mut self) {
        self.selected_panel = self.selected_panel.next();
    }

    pub fn prev_panel(&mut self) {
        self.selected_panel = self.selected_panel.prev();
    }

    pub fn scroll_up(&mut self) {
        let selected = self.selected_mut();
        *selected = selected.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        let len = match self.selected_panel {
            Panel::Agents => self.agents.len(),
            Panel::Messages => self.messages.len(),
            Panel::Locks => self.locks.len(),
        };
        let selected = self.selected_mut();
        if len > 0 {
            *selected = (*selected + 1).min(len - 1);
        }
    }

    fn selected_mut(&mut self) -> &mut usize {
        match self.selected_panel {
            Panel::Agents => &mut self.agent_selected,
            Panel::Messages => &mut self.message_selected,
            Panel::Locks => &mut self.lock_selected,
        }
    }

    /// One bar per hour of message traffic, most recent `width` hours
    pub fn hourly_chart(&self, width: usize) -> String {
        const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
        let hours = &self.stats.hourly_activity;
        let recent = &hours[hours.len().saturating_sub(width)..];
        let peak = recent.iter().map(|h| h.messages).max().unwrap_or(0);
        if peak == 0 {
            return String::new();
        }
        recent
            .iter()
            .map(|h| BARS[(h.messages * (BARS.len() - 1)).div_ceil(peak)])
            .collect()
    }

    pub fn key_hints(&self) -> &'static str {
        "Tab:panel  j/k:move  r:refresh  ?:help  q:quit"
    }
}

fn clamp(selected: usize, len: usize) -> usize {
    if len == 0 { 0 } else { selected.min(len - 1) }
}
