//! Remote-run monitor daemon library
//!
//! Periodically polls a CI service for the latest build of each branch of
//! interest and turns the results into notifications.

pub mod daemon;
pub mod monitor;
pub mod scheduler;
