//! Job-lifecycle pipeline.
//!
//! Four stage queues (submit, monitor, download, resubmit) connect pools of
//! identical workers. A record owns exactly one queue slot at a time and is
//! persisted before every hand-off, so a crash loses at most its place in the
//! live pipeline; [`Pipeline::recover`] re-admits it on the next start.
//!
//! ```text
//! submit ──► monitor ◄──┐ (poll again after poll_interval)
//!               │───────┘
//!               ▼ Done/Failed
//!            download ◄──┐ (retry while download_retries > 0)
//!               │────────┘
//!               ▼
//!      succeeded/<id> | failed/<id>
//!
//! resubmit (operator trigger) ──► reschedule ──► monitor
//! ```

mod download;
mod in_flight;
mod monitor;
mod queue;
mod recovery;
mod resubmit;
mod submit;
#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;

use crate::archive::Archive;
use crate::backend::{Backend, JobSpec};
use crate::config::GjmConfig;
use crate::job_db::{JobDb, JobId, JobRecord};
use crate::report::{self, StatusSummary};
use crate::retry::RetryPolicy;

use self::in_flight::InFlight;
use self::monitor::MonitorItem;
use self::queue::StageQueue;
use self::submit::SubmitRequest;

pub use self::download::DownloadError;
pub use self::submit::{SubmitError, SubmitHandle};

/// Tunables of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub submit_workers: usize,
    pub monitor_workers: usize,
    pub download_workers: usize,
    /// Download retries granted to new and resubmitted jobs.
    pub download_retries: u32,
    /// Minimum delay between two polls of the same job.
    pub poll_interval: Duration,
    /// Delay before a failed download is queued again.
    pub download_retry_delay: Duration,
    /// Backoff applied when status polls of a job keep failing.
    pub poll_backoff: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings::from(&GjmConfig::default())
    }
}

impl From<&GjmConfig> for PipelineSettings {
    fn from(cfg: &GjmConfig) -> Self {
        Self {
            submit_workers: cfg.workers.submit,
            monitor_workers: cfg.workers.monitor,
            download_workers: cfg.workers.download,
            download_retries: cfg.download_retries,
            poll_interval: cfg.poll_interval(),
            download_retry_delay: cfg.download_retry_delay(),
            poll_backoff: cfg.retry.as_ref().map(RetryPolicy::from).unwrap_or_default(),
        }
    }
}

/// State shared by every worker of one pipeline.
pub(crate) struct Shared {
    pub(crate) db: JobDb,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) archive: Archive,
    pub(crate) settings: PipelineSettings,
    pub(crate) submit_q: StageQueue<SubmitRequest>,
    pub(crate) monitor_q: StageQueue<MonitorItem>,
    pub(crate) download_q: StageQueue<JobRecord>,
    pub(crate) resubmit_q: StageQueue<JobRecord>,
    pub(crate) in_flight: InFlight,
    /// Raised once any worker has failed; the pipeline takes no new work.
    pub(crate) halted: watch::Sender<bool>,
}

impl Shared {
    /// Persist a record that is about to change hands. On failure the job
    /// drops out of the live pipeline; the error is fatal to the calling worker.
    pub(crate) async fn persist(&self, record: &JobRecord) -> Result<()> {
        if let Err(e) = self.db.put(record).await {
            self.in_flight.release(record.id);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn halt(&self) {
        self.halted.send_replace(true);
    }

    pub(crate) fn is_halted(&self) -> bool {
        *self.halted.borrow()
    }
}

/// Run one worker to completion, halting the pipeline if it fails.
async fn supervise<F>(shared: Arc<Shared>, what: String, worker: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let res = worker.await.context(what);
    if res.is_err() {
        shared.halt();
    }
    res
}

/// Owner of the stage queues and worker pools.
///
/// Dropping the pipeline aborts its workers; durable state stays in the store.
pub struct Pipeline {
    shared: Arc<Shared>,
    workers: JoinSet<Result<()>>,
}

impl Pipeline {
    /// Create the archive directories under `work_dir` and spawn the worker pools.
    ///
    /// Workers start idle; feed them with [`recover`](Self::recover),
    /// [`resubmit_failed`](Self::resubmit_failed) and [`submit`](Self::submit).
    pub async fn start(
        db: JobDb,
        backend: Arc<dyn Backend>,
        work_dir: impl Into<PathBuf>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        let archive = Archive::new(work_dir);
        archive
            .ensure_dirs()
            .await
            .with_context(|| format!("create archive dirs in {}", archive.work_dir().display()))?;

        let shared = Arc::new(Shared {
            db,
            backend,
            archive,
            settings,
            submit_q: StageQueue::new("submit"),
            monitor_q: StageQueue::new("monitor"),
            download_q: StageQueue::new("download"),
            resubmit_q: StageQueue::new("resubmit"),
            in_flight: InFlight::new(),
            halted: watch::channel(false).0,
        });

        let mut workers = JoinSet::new();
        let s = &shared.settings;
        for worker in 0..s.submit_workers.max(1) {
            let shared = Arc::clone(&shared);
            workers.spawn(supervise(
                Arc::clone(&shared),
                format!("submit worker {}", worker),
                submit::run_worker(shared, worker),
            ));
        }
        for worker in 0..s.monitor_workers.max(1) {
            let shared = Arc::clone(&shared);
            workers.spawn(supervise(
                Arc::clone(&shared),
                format!("monitor worker {}", worker),
                monitor::run_worker(shared, worker),
            ));
        }
        for worker in 0..s.download_workers.max(1) {
            let shared = Arc::clone(&shared);
            workers.spawn(supervise(
                Arc::clone(&shared),
                format!("download worker {}", worker),
                download::run_worker(shared, worker),
            ));
        }
        tracing::debug!(
            submit = s.submit_workers,
            monitor = s.monitor_workers,
            download = s.download_workers,
            "pipeline workers started"
        );

        Ok(Self { shared, workers })
    }

    /// Startup recovery: admit every stored record that is not downloaded yet
    /// to the monitor queue. Returns the number of jobs admitted.
    pub async fn recover(&self) -> Result<usize> {
        recovery::recover(&self.shared).await
    }

    /// Operator-triggered resubmission of every Failed job in the store, as
    /// one `reschedule` batch. Returns the rescheduled ids.
    pub async fn resubmit_failed(&self) -> Result<Vec<JobId>> {
        resubmit::resubmit_failed(&self.shared).await
    }

    /// Queue a job specification for submission. The handle resolves to the
    /// backend id, or to the error that dropped the submission. Once a worker
    /// has failed, pending and new submissions resolve to
    /// [`SubmitError::Stopped`].
    pub fn submit(&self, spec: JobSpec) -> SubmitHandle {
        let (reply, rx) = oneshot::channel();
        let handle = SubmitHandle::new(rx, self.shared.halted.subscribe());
        if self.shared.is_halted() {
            let _ = reply.send(Err(SubmitError::Stopped));
            return handle;
        }
        self.shared.in_flight.begin_submission();
        self.shared.submit_q.push(SubmitRequest { spec, reply });
        handle
    }

    /// Emit a store-wide status summary every `interval` until the pipeline stops.
    /// A store error while reporting stops the pipeline.
    pub fn spawn_reporter<F>(&mut self, interval: Duration, emit: F)
    where
        F: Fn(&StatusSummary) + Send + 'static,
    {
        let db = self.shared.db.clone();
        self.workers.spawn(supervise(
            Arc::clone(&self.shared),
            "status reporter".to_string(),
            report::run_reporter(db, interval, emit),
        ));
    }

    /// Number of jobs currently owning a queue slot.
    pub fn jobs_in_flight(&self) -> usize {
        self.shared.in_flight.job_count()
    }

    pub fn db(&self) -> &JobDb {
        &self.shared.db
    }

    /// Wait until no job is left in flight. Fails as soon as any worker fails.
    pub async fn wait_idle(&mut self) -> Result<()> {
        tokio::select! {
            _ = self.shared.in_flight.wait_idle() => Ok(()),
            err = first_failure(&mut self.workers) => Err(err),
        }
    }

    /// Run until `shutdown` resolves. Fails as soon as any worker fails.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => Ok(()),
            err = first_failure(&mut self.workers) => Err(err),
        }
    }
}

/// First worker error; workers that end cleanly are skipped.
async fn first_failure(workers: &mut JoinSet<Result<()>>) -> anyhow::Error {
    loop {
        match workers.join_next().await {
            Some(Ok(Ok(()))) => continue,
            Some(Ok(Err(e))) => {
                tracing::error!("pipeline worker stopped: {:#}", e);
                return e;
            }
            Some(Err(join)) => return anyhow::anyhow!("pipeline worker task: {}", join),
            None => return std::future::pending().await,
        }
    }
}
