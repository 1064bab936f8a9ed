//! Submit stage: hand job specs to the backend and start tracking the new ids.
//!
//! A failed submission is not retried; the error goes back to whoever queued
//! the job spec.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

use crate::backend::{BackendError, JobSpec};
use crate::job_db::{JobId, JobRecord};

use super::monitor::MonitorItem;
use super::Shared;

pub(crate) struct SubmitRequest {
    pub(crate) spec: JobSpec,
    pub(crate) reply: oneshot::Sender<Result<JobId, SubmitError>>,
}

/// Why a queued job specification did not enter the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("submission rejected: {0}")]
    Backend(#[from] BackendError),
    /// The backend accepted the job but the record could not be stored.
    #[error("job {0} was submitted but could not be recorded")]
    NotPersisted(JobId),
    #[error("pipeline stopped before the submission was processed")]
    Stopped,
}

/// Pending outcome of [`Pipeline::submit`](super::Pipeline::submit).
pub struct SubmitHandle {
    rx: oneshot::Receiver<Result<JobId, SubmitError>>,
    halted: watch::Receiver<bool>,
}

impl SubmitHandle {
    pub(crate) fn new(
        rx: oneshot::Receiver<Result<JobId, SubmitError>>,
        halted: watch::Receiver<bool>,
    ) -> Self {
        Self { rx, halted }
    }

    /// Wait for the backend id of the submitted job.
    ///
    /// Resolves to [`SubmitError::Stopped`] if the pipeline halts or is dropped
    /// before the submission is answered.
    pub async fn wait(self) -> Result<JobId, SubmitError> {
        let Self { mut rx, mut halted } = self;
        tokio::select! {
            biased;
            reply = &mut rx => return reply.unwrap_or(Err(SubmitError::Stopped)),
            _ = halted.wait_for(|h| *h) => {}
        }
        // An answer sent just before the halt still wins.
        rx.try_recv().unwrap_or(Err(SubmitError::Stopped))
    }
}

pub(crate) async fn run_worker(shared: Arc<Shared>, worker: usize) -> Result<()> {
    while let Some(req) = shared.submit_q.pop().await {
        submit_one(&shared, worker, req).await?;
    }
    Ok(())
}

async fn submit_one(shared: &Shared, worker: usize, req: SubmitRequest) -> Result<()> {
    let SubmitRequest { spec, reply } = req;
    if shared.is_halted() {
        tracing::warn!(worker, spec = %spec, "pipeline halted, dropping submission");
        shared.in_flight.end_submission();
        let _ = reply.send(Err(SubmitError::Stopped));
        return Ok(());
    }
    tracing::info!(worker, spec = %spec, "submitting job");

    let id = match shared.backend.submit(&spec).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(worker, spec = %spec, "submission failed: {}", e);
            shared.in_flight.end_submission();
            let _ = reply.send(Err(SubmitError::Backend(e)));
            return Ok(());
        }
    };

    let record = JobRecord::submitted(id, shared.settings.download_retries);
    if let Err(e) = shared.db.put(&record).await {
        shared.in_flight.end_submission();
        let _ = reply.send(Err(SubmitError::NotPersisted(id)));
        return Err(e);
    }

    // Admit before closing the submission so the pipeline never looks idle in between.
    let admitted = shared.in_flight.admit(id);
    shared.in_flight.end_submission();
    if admitted {
        shared.monitor_q.push(MonitorItem::new(record));
    } else {
        tracing::warn!(job_id = id, "backend returned an id that is already tracked");
    }
    tracing::info!(job_id = id, worker, spec = %spec, "submitted job");
    let _ = reply.send(Ok(id));
    Ok(())
}
