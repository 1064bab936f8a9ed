//! Monitor stage: poll each job until the backend reports Done or Failed.

use anyhow::Result;
use std::sync::Arc;

use crate::job_db::{JobRecord, JobStatus};

use super::Shared;

/// A record waiting for its next poll, with its run of failed polls.
pub(crate) struct MonitorItem {
    pub(crate) record: JobRecord,
    pub(crate) poll_failures: u32,
}

impl MonitorItem {
    pub(crate) fn new(record: JobRecord) -> Self {
        Self {
            record,
            poll_failures: 0,
        }
    }
}

pub(crate) async fn run_worker(shared: Arc<Shared>, worker: usize) -> Result<()> {
    while let Some(item) = shared.monitor_q.pop().await {
        monitor_one(&shared, worker, item).await?;
    }
    Ok(())
}

async fn monitor_one(shared: &Shared, worker: usize, item: MonitorItem) -> Result<()> {
    let MonitorItem {
        mut record,
        poll_failures,
    } = item;
    let id = record.id;
    let settings = &shared.settings;

    let status = match shared.backend.poll_status(id).await {
        Ok(status) => status,
        Err(e) => {
            // Transient: keep the job and poll again later, backing off.
            let failures = poll_failures.saturating_add(1);
            let delay = settings.poll_backoff.backoff(failures).max(settings.poll_interval);
            tracing::warn!(
                job_id = id,
                worker,
                failures,
                "status poll failed, retrying in {:?}: {}",
                delay,
                e
            );
            shared.monitor_q.push_after(
                MonitorItem {
                    record,
                    poll_failures: failures,
                },
                delay,
            );
            return Ok(());
        }
    };

    let previous = record.status;
    record.status = status;

    if status.is_terminal() {
        match status {
            JobStatus::Done => tracing::info!(job_id = id, "job {} finished", id),
            _ => tracing::info!(job_id = id, "job {} failed", id),
        }
        shared.persist(&record).await?;
        shared.download_q.push(record);
        return Ok(());
    }

    if status != previous {
        shared.persist(&record).await?;
        tracing::info!(job_id = id, "job {} changed to {}", id, status);
    }
    shared
        .monitor_q
        .push_after(MonitorItem::new(record), settings.poll_interval);
    Ok(())
}
