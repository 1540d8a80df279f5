//! Structured JSONL event log with size-based rotation.
//!
//! Every notification the monitor delivers can be mirrored here as one
//! compact JSON line. The first line of each file is a schema header mapping
//! the short keys to their meaning.

use crate::config::EventLogSettings;
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_FILES: u32 = 5;
const DEFAULT_FILE_NAME: &str = "events.jsonl";

/// Resolved event log settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventLogConfig {
    pub path: PathBuf,
    pub max_bytes: u64,
    pub max_files: u32,
}

impl EventLogConfig {
    /// Resolve settings against the rrm home directory.
    ///
    /// `RRM_LOG_FILE` wins over the configured path.
    pub fn from_settings(settings: &EventLogSettings, home_dir: &Path) -> Self {
        let path = std::env::var("RRM_LOG_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| settings.path.clone())
            .unwrap_or_else(|| crate::home::config_dir(home_dir).join(DEFAULT_FILE_NAME));

        Self {
            path,
            max_bytes: settings
                .max_bytes
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_MAX_BYTES),
            max_files: settings
                .max_files
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_MAX_FILES),
        }
    }
}

/// One event destined for the log. Empty `level`/`source`/`action` are rejected.
#[derive(Clone, Debug, Default)]
pub struct EventFields {
    pub level: &'static str,
    pub source: &'static str,
    pub action: &'static str,
    pub build_id: Option<String>,
    pub branch: Option<String>,
    pub state: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
    pub message_text: Option<String>,
}

/// Append-only JSONL sink with rotation
#[derive(Debug)]
pub struct EventLog {
    config: EventLogConfig,
    // Serializes rotate + append so concurrent writers never interleave lines
    write_lock: Mutex<()>,
}

impl EventLog {
    pub fn new(config: EventLogConfig) -> Self {
        Self {
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Append a single event.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created or the file
    /// cannot be written. Events with missing required fields are dropped
    /// silently.
    pub fn append(&self, fields: EventFields) -> std::io::Result<()> {
        if fields.level.is_empty() || fields.source.is_empty() || fields.action.is_empty() {
            return Ok(());
        }

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        ensure_parent(&self.config.path)?;
        rotate_if_needed(&self.config.path, self.config.max_bytes, self.config.max_files)?;
        write_header_if_empty(&self.config.path)?;

        let line = Value::Object(event_object(fields)).to_string();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()
    }
}

fn event_object(fields: EventFields) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("v".to_string(), Value::from(1));
    obj.insert("k".to_string(), Value::from("e"));
    obj.insert("ts".to_string(), Value::from(Utc::now().to_rfc3339()));
    obj.insert("lv".to_string(), Value::from(fields.level));
    obj.insert("src".to_string(), Value::from(fields.source));
    obj.insert("act".to_string(), Value::from(fields.action));

    let optional = [
        ("bid", fields.build_id),
        ("br", fields.branch),
        ("st", fields.state),
        ("url", fields.url),
        ("err", fields.error),
        ("msg", fields.message_text),
    ];
    for (key, value) in optional {
        if let Some(v) = value {
            obj.insert(key.to_string(), Value::from(v));
        }
    }
    obj
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn rotated_path(path: &Path, idx: u32) -> PathBuf {
    PathBuf::from(format!("{}.{}", path.display(), idx))
}

fn rotate_if_needed(path: &Path, max_bytes: u64, max_files: u32) -> std::io::Result<()> {
    if !path.exists() {
        return Ok(());
    }

    if fs::metadata(path)?.len() < max_bytes {
        return Ok(());
    }

    for idx in (1..max_files).rev() {
        let src = rotated_path(path, idx);
        let dst = rotated_path(path, idx + 1);
        if src.exists() {
            let _ = fs::rename(&src, &dst);
        }
    }
    let _ = fs::rename(path, rotated_path(path, 1));
    Ok(())
}

fn schema_header_line() -> String {
    json!({
        "v": 1,
        "k": "h",
        "ts": Utc::now().to_rfc3339(),
        "m": {
            "v": "schema_version",
            "k": "record_kind",
            "ts": "timestamp",
            "lv": "level",
            "src": "source",
            "act": "action",
            "bid": "build_id",
            "br": "branch",
            "st": "build_state",
            "url": "build_url",
            "err": "error",
            "msg": "message_text"
        }
    })
    .to_string()
}

fn write_header_if_empty(path: &Path) -> std::io::Result<()> {
    let should_write = !path.exists() || fs::metadata(path)?.len() == 0;
    if !should_write {
        return Ok(());
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(schema_header_line().as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()
}
