//! Tolerant loading of the fetcher's snapshot file.
//!
//! The store never fails its caller: every read problem is logged and collapsed
//! into an empty [`Snapshot`]. [`SnapshotStore::try_load`] exposes the fault for
//! the few callers (the poll loop, the status command) that need to tell "no
//! data yet" apart from "data says nothing happened".

use crate::types::Snapshot;
use serde_json::Value;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{error, warn};

/// Why a snapshot could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotFault {
    /// The file does not exist (yet).
    NotFound,
    /// The file exists but could not be read.
    Unreadable(String),
    /// The content is not valid JSON, typically a half-written file.
    ParseError(String),
    /// Valid JSON whose top level is not an object.
    SchemaError(String),
}

impl fmt::Display for SnapshotFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotFault::NotFound => write!(f, "snapshot file not found"),
            SnapshotFault::Unreadable(e) => write!(f, "snapshot file unreadable: {}", e),
            SnapshotFault::ParseError(e) => write!(f, "failed to parse snapshot: {}", e),
            SnapshotFault::SchemaError(kind) => {
                write!(f, "snapshot top level is {}, expected an object", kind)
            }
        }
    }
}

/// Point-in-time description of the snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStatus {
    pub path: PathBuf,
    pub exists: bool,
    pub modified: Option<SystemTime>,
    pub items: usize,
    pub checks: usize,
    pub fault: Option<SnapshotFault>,
}

/// Reader for the snapshot file at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Create a store reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the snapshot file currently exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the snapshot, reporting why it could not be read.
    pub fn try_load(&self) -> Result<Snapshot, SnapshotFault> {
        let value = self.read_object()?;
        Snapshot::from_value(value).map_err(|e| SnapshotFault::SchemaError(e.to_string()))
    }

    /// Load the snapshot. Faults are logged and yield an empty snapshot.
    pub fn load(&self) -> Snapshot {
        match self.try_load() {
            Ok(snapshot) => snapshot,
            Err(fault) => {
                self.report(&fault);
                Snapshot::default()
            }
        }
    }

    /// Raw JSON of one top-level section, for debug dumps.
    pub fn raw_section(&self, section: &str) -> Option<Value> {
        match self.read_object() {
            Ok(Value::Object(mut map)) => map.remove(section),
            Ok(_) => None,
            Err(fault) => {
                self.report(&fault);
                None
            }
        }
    }

    /// Describe the snapshot file without failing.
    pub fn status(&self) -> SnapshotStatus {
        let modified = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok();
        let (items, checks, fault) = match self.try_load() {
            Ok(snapshot) => (snapshot.events().len(), snapshot.checks_done(), None),
            Err(fault) => (0, 0, Some(fault)),
        };
        SnapshotStatus {
            path: self.path.clone(),
            exists: self.exists(),
            modified,
            items,
            checks,
            fault,
        }
    }

    /// [`Self::try_load`] on the blocking pool.
    pub async fn try_load_async(&self) -> Result<Snapshot, SnapshotFault> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.try_load())
            .await
            .map_err(|e| SnapshotFault::Unreadable(format!("join snapshot read task failed: {}", e)))?
    }

    /// [`Self::load`] on the blocking pool.
    pub async fn load_async(&self) -> Snapshot {
        match self.try_load_async().await {
            Ok(snapshot) => snapshot,
            Err(fault) => {
                self.report(&fault);
                Snapshot::default()
            }
        }
    }

    /// Log a fault on the side channel.
    pub fn report(&self, fault: &SnapshotFault) {
        match fault {
            SnapshotFault::NotFound => {
                warn!(target: "apbridge::snapshot", "state file not found at {}", self.path.display())
            }
            _ => error!(target: "apbridge::snapshot", "{} ({})", fault, self.path.display()),
        }
    }

    fn read_object(&self) -> Result<Value, SnapshotFault> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SnapshotFault::NotFound,
            _ => SnapshotFault::Unreadable(e.to_string()),
        })?;

        let value: Value =
            serde_json::from_str(&content).map_err(|e| SnapshotFault::ParseError(e.to_string()))?;

        match value {
            Value::Object(_) => Ok(value),
            other => Err(SnapshotFault::SchemaError(json_kind(&other).to_string())),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Last `lines` lines of a text file such as the fetcher log.
pub fn read_log_tail(path: &Path, lines: usize) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    Ok(all[start..].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn store_with(content: &str) -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        let mut file = std::fs::File::create(&path).expect("create state");
        file.write_all(content.as_bytes()).expect("write state");
        (dir, SnapshotStore::new(path))
    }

    #[test]
    fn missing_file_is_not_found_and_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path().join("absent.json"));
        assert_eq!(store.try_load().unwrap_err(), SnapshotFault::NotFound);
        let snapshot = store.load();
        assert!(snapshot.events().is_empty());
        assert!(!snapshot.has_items_section());
    }

    #[test]
    fn half_written_file_is_a_parse_error() {
        let (_dir, store) = store_with(r#"{"items": [{"index": 1, "item""#);
        assert!(matches!(store.try_load(), Err(SnapshotFault::ParseError(_))));
        assert!(store.load().events().is_empty());
    }

    #[test]
    fn non_object_top_level_is_a_schema_error() {
        let (_dir, store) = store_with("[1, 2, 3]");
        assert_eq!(
            store.try_load().unwrap_err(),
            SnapshotFault::SchemaError("an array".to_string())
        );
    }

    #[test]
    fn raw_section_and_status_reflect_the_file() {
        let (_dir, store) = store_with(
            r#"{"room": {"seed": "abc"}, "items": [{"index": 0, "item": 1}], "checked_locations": [4, 5]}"#,
        );
        assert_eq!(
            store.raw_section("room"),
            Some(serde_json::json!({"seed": "abc"}))
        );
        assert_eq!(store.raw_section("missing"), None);

        let status = store.status();
        assert!(status.exists);
        assert_eq!(status.items, 1);
        assert_eq!(status.checks, 2);
        assert!(status.fault.is_none());
    }

    #[tokio::test]
    async fn async_load_matches_sync_load() {
        let (_dir, store) = store_with(r#"{"items": [{"index": 3, "item": 8, "location": 2}]}"#);
        let snapshot = store.load_async().await;
        assert_eq!(snapshot.events().len(), 1);
        assert_eq!(snapshot.events()[0].pair(), (Some(8), Some(2)));
    }

    #[test]
    fn log_tail_returns_last_lines() {
        let (dir, _store) = store_with("{}");
        let log = dir.path().join("fetcher.log");
        std::fs::write(&log, "one\ntwo\nthree\n").expect("write log");
        assert_eq!(read_log_tail(&log, 2).expect("tail"), "two\nthree");
        assert_eq!(read_log_tail(&log, 10).expect("tail"), "one\ntwo\nthree");
    }
}
