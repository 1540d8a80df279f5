//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Monitor settings: [monitor]
    ///
    /// Kept as a raw table; the daemon validates it into a typed config.
    #[serde(default)]
    pub monitor: toml::Table,
    /// Event log configuration: [event_log]
    #[serde(default)]
    pub event_log: EventLogSettings,
    /// Provider-specific configuration sections: [providers.<name>]
    #[serde(default)]
    pub providers: HashMap<String, toml::Table>,
}

impl Config {
    /// Config table for a CI provider, if one was given
    pub fn provider_config(&self, name: &str) -> Option<&toml::Table> {
        self.providers.get(name)
    }

    /// Mutable config table for a CI provider, created on demand
    pub fn provider_config_mut(&mut self, name: &str) -> &mut toml::Table {
        self.providers.entry(name.to_string()).or_default()
    }
}

/// Event log configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogSettings {
    /// Disable the JSONL event log entirely
    #[serde(default)]
    pub disabled: bool,
    /// Log file path (default: ~/.config/rrm/events.jsonl)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Rotate once the file reaches this many bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
    /// Number of rotated files to keep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<u32>,
}
