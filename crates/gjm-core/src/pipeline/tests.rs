//! Pipeline tests that need crate-internal access (store pool, queues).

use super::*;
use crate::backend::BackendError;
use crate::job_db::db::open_memory;
use crate::job_db::JobStatus;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// Backend where every job is Done at the first poll.
#[derive(Default)]
struct StubBackend {
    last_id: AtomicI64,
    fail_reschedule: bool,
    rescheduled: Mutex<Vec<Vec<JobId>>>,
}

#[async_trait]
impl Backend for StubBackend {
    async fn submit(&self, _spec: &JobSpec) -> Result<JobId, BackendError> {
        Ok(self.last_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn reschedule(&self, ids: &[JobId]) -> Result<(), BackendError> {
        if self.fail_reschedule {
            return Err(BackendError::Rejected("reschedule refused".to_string()));
        }
        self.rescheduled.lock().unwrap().push(ids.to_vec());
        Ok(())
    }

    async fn poll_status(&self, _id: JobId) -> Result<JobStatus, BackendError> {
        Ok(JobStatus::Done)
    }

    async fn fetch_output(&self, id: JobId, dest_dir: &Path) -> Result<PathBuf, BackendError> {
        let out = dest_dir.join(id.to_string());
        tokio::fs::create_dir_all(&out).await?;
        Ok(out)
    }
}

fn settings(submit_workers: usize) -> PipelineSettings {
    PipelineSettings {
        submit_workers,
        monitor_workers: 1,
        download_workers: 1,
        download_retries: 1,
        poll_interval: Duration::ZERO,
        download_retry_delay: Duration::ZERO,
        poll_backoff: RetryPolicy::immediate(),
    }
}

fn failed(id: JobId) -> JobRecord {
    JobRecord {
        id,
        status: JobStatus::Failed,
        downloaded: false,
        download_retries: 0,
    }
}

#[tokio::test]
async fn store_failure_stops_pending_submissions() {
    let work = tempfile::tempdir().unwrap();
    let db = open_memory().await.unwrap();
    sqlx::query("DROP TABLE jobs").execute(&db.pool).await.unwrap();
    let backend = Arc::new(StubBackend::default());
    let mut pipeline = Pipeline::start(db, backend, work.path(), settings(1))
        .await
        .unwrap();

    let first = pipeline.submit(JobSpec::new("a.jdl"));
    let second = pipeline.submit(JobSpec::new("b.jdl"));
    assert!(matches!(first.wait().await, Err(SubmitError::NotPersisted(1))));
    let second = tokio::time::timeout(Duration::from_secs(5), second.wait())
        .await
        .expect("pending submission answered after halt");
    assert!(matches!(second, Err(SubmitError::Stopped)));

    let err = tokio::time::timeout(Duration::from_secs(5), pipeline.wait_idle())
        .await
        .expect("worker failure surfaced")
        .unwrap_err();
    assert!(format!("{:#}", err).contains("submit worker 0"), "{:#}", err);

    // Nothing new is accepted once halted.
    let late = pipeline.submit(JobSpec::new("c.jdl"));
    assert!(matches!(late.wait().await, Err(SubmitError::Stopped)));
}

#[tokio::test]
async fn resubmit_batch_skips_jobs_already_in_flight() {
    let work = tempfile::tempdir().unwrap();
    let db = open_memory().await.unwrap();
    db.put(&failed(7)).await.unwrap();
    db.put(&failed(9)).await.unwrap();
    let backend = Arc::new(StubBackend::default());
    let mut pipeline = Pipeline::start(db.clone(), backend.clone(), work.path(), settings(1))
        .await
        .unwrap();

    // 7 still has a live copy in the pipeline.
    assert!(pipeline.shared.in_flight.admit(7));
    pipeline.shared.resubmit_q.push(failed(7));
    pipeline.shared.resubmit_q.push(failed(9));
    let ids = resubmit::run_batch(&pipeline.shared).await.unwrap();
    assert_eq!(ids, vec![9]);
    assert_eq!(*backend.rescheduled.lock().unwrap(), vec![vec![9]]);

    pipeline.shared.in_flight.release(7);
    tokio::time::timeout(Duration::from_secs(10), pipeline.wait_idle())
        .await
        .expect("idle in time")
        .unwrap();

    assert_eq!(db.get(7).await.unwrap(), Some(failed(7)));
    let rec = db.get(9).await.unwrap().expect("job exists");
    assert_eq!((rec.status, rec.downloaded), (JobStatus::Done, true));
}

#[tokio::test]
async fn failed_reschedule_leaves_records_untouched() {
    let work = tempfile::tempdir().unwrap();
    let db = open_memory().await.unwrap();
    db.put(&failed(3)).await.unwrap();
    let backend = Arc::new(StubBackend {
        fail_reschedule: true,
        ..StubBackend::default()
    });
    let pipeline = Pipeline::start(db.clone(), backend, work.path(), settings(1))
        .await
        .unwrap();

    assert!(pipeline.resubmit_failed().await.is_err());
    assert_eq!(pipeline.jobs_in_flight(), 0);
    assert_eq!(db.get(3).await.unwrap(), Some(failed(3)));
}
