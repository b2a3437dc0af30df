//! Session lifecycle export.
//!
//! Scans a time window of the session table (snapshots plus domain events),
//! folds every record into a per-session summary and renders the summaries
//! as a CSV table.

pub mod config;
pub mod engine;
pub mod events;
pub mod export;
pub mod job;
pub mod logging;
pub mod source;
pub mod storage;
