//! Core types for remote-run-monitor (rrm)
//!
//! This crate holds the pieces shared by every rrm binary:
//! - layered configuration resolution (`.rrm.toml`, global config, env, CLI)
//! - home directory resolution honouring `RRM_HOME`
//! - process-level tracing initialisation
//! - the rotating JSONL event log used by the notifier

pub mod config;
pub mod event_log;
pub mod home;
pub mod logging;

// Re-export toml for provider config access
pub use toml;
