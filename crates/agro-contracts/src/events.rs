use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type EventPayload = Map<String, Value>;

pub const SESSION_STARTED: &str = "session_started";
pub const MODULE_SELECTED: &str = "module_selected";
pub const QUERY_STARTED: &str = "query_started";
pub const QUERY_SUCCEEDED: &str = "query_succeeded";
pub const QUERY_FAILED: &str = "query_failed";
pub const SESSION_FINISHED: &str = "session_finished";

/// Keys the writer owns on every line.
const ENVELOPE_KEYS: [&str; 3] = ["type", "session_id", "ts"];

/// JSONL log of one advisory session.
///
/// Each line is `{type, session_id, ts, ...payload}`. Clones append to the
/// same file under one lock, which is how controller workers share it.
#[derive(Debug, Clone)]
pub struct EventWriter {
    log: Arc<SessionLog>,
}

#[derive(Debug)]
struct SessionLog {
    path: PathBuf,
    session_id: String,
    file_lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            log: Arc::new(SessionLog {
                path: path.into(),
                session_id: session_id.into(),
                file_lock: Mutex::new(()),
            }),
        }
    }

    pub fn for_new_session(path: impl Into<PathBuf>) -> Self {
        Self::new(path, new_session_id())
    }

    pub fn path(&self) -> &Path {
        &self.log.path
    }

    pub fn session_id(&self) -> &str {
        &self.log.session_id
    }

    /// Appends one event and returns it as written. Payload keys that clash
    /// with the envelope are ignored.
    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let event = self.envelope(event_type, payload);
        self.append_line(&serde_json::to_string(&event)?)?;
        Ok(event)
    }

    fn envelope(&self, event_type: &str, payload: EventPayload) -> Value {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::from(event_type));
        event.insert("session_id".to_string(), Value::from(self.session_id()));
        event.insert("ts".to_string(), Value::from(now_utc_iso()));
        event.extend(
            payload
                .into_iter()
                .filter(|(key, _)| !ENVELOPE_KEYS.contains(&key.as_str())),
        );
        Value::Object(event)
    }

    fn append_line(&self, line: &str) -> anyhow::Result<()> {
        let path = self.path();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating event log directory {}", dir.display()))?;
        }
        let _held = self
            .log
            .file_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening event log {}", path.display()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
