//! Durable job store (SQLite via sqlx).
//!
//! Maps backend job id to the JSON-encoded job record. Survives restarts and
//! is scanned in id order for recovery and reporting.

pub mod db;
mod jobs;
pub mod types;

pub use db::*;
pub use jobs::JobScan;
pub use types::*;
