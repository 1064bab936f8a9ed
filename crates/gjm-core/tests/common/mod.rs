#![allow(dead_code)]

pub mod fake_backend;

use gjm_core::pipeline::{Pipeline, PipelineSettings};
use gjm_core::retry::RetryPolicy;
use std::time::Duration;

/// Small pools and no waiting between polls or retries.
pub fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        submit_workers: 2,
        monitor_workers: 3,
        download_workers: 2,
        download_retries: 1,
        poll_interval: Duration::ZERO,
        download_retry_delay: Duration::ZERO,
        poll_backoff: RetryPolicy::immediate(),
    }
}

pub async fn wait_idle(pipeline: &mut Pipeline) {
    tokio::time::timeout(Duration::from_secs(10), pipeline.wait_idle())
        .await
        .expect("pipeline went idle in time")
        .expect("pipeline workers healthy");
}
