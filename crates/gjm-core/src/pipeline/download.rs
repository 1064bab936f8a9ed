//! Download stage: fetch the output sandbox of finished jobs and archive it.
//!
//! Each failure, backend or local, spends one of the record's download
//! retries. Once none are left the job is forced to Failed, whatever was
//! partially fetched is swept into `failed/<id>`, and the job leaves the
//! pipeline without being marked downloaded.

use anyhow::Result;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::BackendError;
use crate::job_db::{JobRecord, JobStatus};

use super::Shared;

/// Why one download attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("archiving output failed: {0}")]
    Archive(#[from] io::Error),
    #[error("job is not finished (status {0})")]
    NotTerminal(JobStatus),
}

impl DownloadError {
    fn cause(&self) -> &'static str {
        match self {
            DownloadError::Backend(_) => "backend",
            DownloadError::Archive(_) => "local",
            DownloadError::NotTerminal(_) => "state",
        }
    }
}

pub(crate) async fn run_worker(shared: Arc<Shared>, worker: usize) -> Result<()> {
    while let Some(record) = shared.download_q.pop().await {
        download_one(&shared, worker, record).await?;
    }
    Ok(())
}

async fn fetch_and_archive(shared: &Shared, record: &JobRecord) -> Result<PathBuf, DownloadError> {
    let dest = shared
        .archive
        .destination(record.id, record.status)
        .ok_or(DownloadError::NotTerminal(record.status))?;
    let fetched = shared
        .backend
        .fetch_output(record.id, shared.archive.work_dir())
        .await?;
    shared.archive.file_output(&fetched, &dest).await?;
    Ok(dest)
}

async fn download_one(shared: &Shared, worker: usize, mut record: JobRecord) -> Result<()> {
    let id = record.id;
    tracing::info!(job_id = id, worker, "downloading job {}", id);

    let err = match fetch_and_archive(shared, &record).await {
        Ok(dest) => {
            record.downloaded = true;
            shared.persist(&record).await?;
            shared.in_flight.release(id);
            tracing::info!(job_id = id, path = %dest.display(), "downloaded job {}", id);
            return Ok(());
        }
        Err(e) => e,
    };

    tracing::warn!(
        job_id = id,
        worker,
        cause = err.cause(),
        "could not download output of job {}: {}",
        id,
        err
    );

    if record.download_retries > 0 {
        record.download_retries -= 1;
        shared.persist(&record).await?;
        tracing::info!(
            job_id = id,
            retries_left = record.download_retries,
            "retrying download of job {} later",
            id
        );
        shared
            .download_q
            .push_after(record, shared.settings.download_retry_delay);
        return Ok(());
    }

    record.status = JobStatus::Failed;
    record.downloaded = false;
    match shared.archive.sweep_partial(id).await {
        Ok(Some(path)) => {
            tracing::info!(job_id = id, path = %path.display(), "moved partial output")
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(job_id = id, "could not move partial output: {}", e),
    }
    shared.persist(&record).await?;
    shared.in_flight.release(id);
    tracing::error!(job_id = id, "download retries of job {} exhausted, marked Failed", id);
    Ok(())
}
