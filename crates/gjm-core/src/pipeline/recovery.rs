//! Startup recovery: put every undownloaded job back under monitoring.
//!
//! The last known status does not matter; a job that was already terminal is
//! polled once more and then downloaded again.

use anyhow::{Context, Result};

use super::monitor::MonitorItem;
use super::Shared;

pub(crate) async fn recover(shared: &Shared) -> Result<usize> {
    let mut admitted = 0usize;
    let mut scan = shared.db.scan();
    while let Some(record) = scan.next().await.context("scan job store for recovery")? {
        if record.downloaded {
            continue;
        }
        if !shared.in_flight.admit(record.id) {
            tracing::debug!(job_id = record.id, "already in the pipeline, skipping recovery");
            continue;
        }
        tracing::debug!(job_id = record.id, status = %record.status, "recovering job");
        shared.monitor_q.push(MonitorItem::new(record));
        admitted += 1;
    }
    if admitted > 0 {
        tracing::info!("recovered {} job(s) from previous run", admitted);
    }
    Ok(admitted)
}
