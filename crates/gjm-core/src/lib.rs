pub mod config;
pub mod logging;

pub mod archive;
pub mod backend;
pub mod job_db;
pub mod pipeline;
pub mod report;
pub mod retry;
