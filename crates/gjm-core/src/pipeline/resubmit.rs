//! Resubmit stage: reschedule Failed jobs in one batch per operator request.
//!
//! The stage drains whatever sits in the resubmit queue, keyed by id with the
//! last queued copy winning, and calls `reschedule` once for the whole batch.
//! It does not loop; each trigger is one batch.

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use crate::job_db::{JobId, JobRecord, JobStatus};

use super::monitor::MonitorItem;
use super::Shared;

/// Queue every Failed record in the store for resubmission, then run the batch.
pub(crate) async fn resubmit_failed(shared: &Shared) -> Result<Vec<JobId>> {
    let mut scan = shared.db.scan();
    while let Some(record) = scan.next().await.context("scan job store for failed jobs")? {
        if record.status != JobStatus::Failed {
            continue;
        }
        if shared.in_flight.contains(record.id) {
            tracing::warn!(job_id = record.id, "failed job is still in the pipeline, not resubmitting");
            continue;
        }
        shared.resubmit_q.push(record);
    }
    run_batch(shared).await
}

/// Reschedule everything currently queued for resubmission.
///
/// Ids are admitted before anything is written, so a record that is already
/// in flight is skipped rather than overwritten behind its live copy.
pub(crate) async fn run_batch(shared: &Shared) -> Result<Vec<JobId>> {
    let queued: BTreeMap<JobId, JobRecord> = shared
        .resubmit_q
        .drain()
        .await
        .into_iter()
        .map(|r| (r.id, r))
        .collect();
    let mut batch = BTreeMap::new();
    for (id, record) in queued {
        if shared.in_flight.admit(id) {
            batch.insert(id, record);
        } else {
            tracing::warn!(job_id = id, "job is already in the pipeline, not resubmitting");
        }
    }
    if batch.is_empty() {
        tracing::info!("no failed jobs to resubmit");
        return Ok(Vec::new());
    }

    let ids: Vec<JobId> = batch.keys().copied().collect();
    let listed = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    tracing::info!("resubmitting jobs {}", listed);
    if let Err(e) = shared.backend.reschedule(&ids).await {
        for id in &ids {
            shared.in_flight.release(*id);
        }
        return Err(e).with_context(|| format!("reschedule jobs {}", listed));
    }

    let mut pending = batch.into_values();
    while let Some(mut record) = pending.next() {
        record.status = JobStatus::Submitted;
        record.downloaded = false;
        record.download_retries = shared.settings.download_retries;
        if let Err(e) = shared.persist(&record).await {
            for rest in pending {
                shared.in_flight.release(rest.id);
            }
            return Err(e);
        }
        shared.monitor_q.push(MonitorItem::new(record));
    }
    tracing::info!(count = ids.len(), "resubmitted jobs");
    Ok(ids)
}
