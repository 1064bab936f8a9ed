//! Scripted in-process backend for pipeline tests.
//!
//! Status polls answer from a per-job script; once the script runs out the
//! last reported status repeats. Downloads succeed unless an outcome is
//! scripted for the job.

use async_trait::async_trait;
use gjm_core::backend::{Backend, BackendError, JobSpec};
use gjm_core::job_db::{JobDb, JobId, JobStatus};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub enum Poll {
    Status(JobStatus),
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    Ok,
    Fail,
    /// Leave a half-written sandbox behind, then fail.
    Partial,
    /// Write the sandbox but report a path that does not exist, so the
    /// local move into the archive fails.
    Misplaced,
}

#[derive(Default)]
pub struct FakeBackend {
    next_ids: Mutex<VecDeque<JobId>>,
    rejected_specs: Mutex<HashSet<PathBuf>>,
    polls: Mutex<HashMap<JobId, VecDeque<Poll>>>,
    current: Mutex<HashMap<JobId, JobStatus>>,
    fetches: Mutex<HashMap<JobId, VecDeque<Fetch>>>,
    store: Mutex<Option<JobDb>>,
    /// Stored status of the job at the time of each poll, in call order.
    pub seen_at_poll: Mutex<Vec<(JobId, Option<JobStatus>)>>,
    pub poll_calls: Mutex<HashMap<JobId, usize>>,
    pub fetch_calls: Mutex<HashMap<JobId, usize>>,
    pub rescheduled: Mutex<Vec<Vec<JobId>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(self, ids: &[JobId]) -> Self {
        self.next_ids.lock().unwrap().extend(ids.iter().copied());
        self
    }

    pub fn reject_spec(self, spec: &str) -> Self {
        self.rejected_specs.lock().unwrap().insert(PathBuf::from(spec));
        self
    }

    pub fn with_polls(self, id: JobId, script: &[Poll]) -> Self {
        self.polls
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .extend(script.iter().copied());
        self
    }

    pub fn with_fetches(self, id: JobId, script: &[Fetch]) -> Self {
        self.fetches
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .extend(script.iter().copied());
        self
    }

    /// Record the stored status of a job every time it is polled.
    pub fn observe_store(&self, db: JobDb) {
        *self.store.lock().unwrap() = Some(db);
    }

    pub fn polls_of(&self, id: JobId) -> usize {
        self.poll_calls.lock().unwrap().get(&id).copied().unwrap_or(0)
    }

    pub fn fetches_of(&self, id: JobId) -> usize {
        self.fetch_calls.lock().unwrap().get(&id).copied().unwrap_or(0)
    }

    pub fn seen_for(&self, id: JobId) -> Vec<Option<JobStatus>> {
        self.seen_at_poll
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, _)| *i == id)
            .map(|(_, s)| *s)
            .collect()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn submit(&self, spec: &JobSpec) -> Result<JobId, BackendError> {
        if self.rejected_specs.lock().unwrap().contains(&spec.description) {
            return Err(BackendError::Rejected(format!("invalid JDL {}", spec)));
        }
        let id = self
            .next_ids
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BackendError::Rejected("no more ids".to_string()))?;
        self.current.lock().unwrap().insert(id, JobStatus::Submitted);
        Ok(id)
    }

    async fn reschedule(&self, ids: &[JobId]) -> Result<(), BackendError> {
        self.rescheduled.lock().unwrap().push(ids.to_vec());
        let mut current = self.current.lock().unwrap();
        for id in ids {
            current.insert(*id, JobStatus::Submitted);
        }
        Ok(())
    }

    async fn poll_status(&self, id: JobId) -> Result<JobStatus, BackendError> {
        let db = self.store.lock().unwrap().clone();
        if let Some(db) = db {
            let stored = db.get(id).await.ok().flatten().map(|r| r.status);
            self.seen_at_poll.lock().unwrap().push((id, stored));
        }
        *self.poll_calls.lock().unwrap().entry(id).or_default() += 1;

        let next = self
            .polls
            .lock()
            .unwrap()
            .get_mut(&id)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Poll::Error) => Err(BackendError::Rejected("service unavailable".to_string())),
            Some(Poll::Status(status)) => {
                self.current.lock().unwrap().insert(id, status);
                Ok(status)
            }
            None => self
                .current
                .lock()
                .unwrap()
                .get(&id)
                .copied()
                .ok_or_else(|| BackendError::Rejected(format!("job {} unknown", id))),
        }
    }

    async fn fetch_output(&self, id: JobId, dest_dir: &Path) -> Result<PathBuf, BackendError> {
        *self.fetch_calls.lock().unwrap().entry(id).or_default() += 1;
        let outcome = self
            .fetches
            .lock()
            .unwrap()
            .get_mut(&id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Fetch::Ok);

        let out_dir = dest_dir.join(id.to_string());
        match outcome {
            Fetch::Fail => Err(BackendError::Rejected("sandbox expired".to_string())),
            Fetch::Partial => {
                tokio::fs::create_dir_all(&out_dir).await?;
                tokio::fs::write(out_dir.join("partial.out"), b"trunc").await?;
                Err(BackendError::Rejected("connection reset".to_string()))
            }
            Fetch::Misplaced => {
                tokio::fs::create_dir_all(&out_dir).await?;
                tokio::fs::write(out_dir.join("std.out"), format!("output of {}", id)).await?;
                Ok(dest_dir.join(format!("{}.missing", id)))
            }
            Fetch::Ok => {
                tokio::fs::create_dir_all(&out_dir).await?;
                tokio::fs::write(out_dir.join("std.out"), format!("output of {}", id)).await?;
                Ok(out_dir)
            }
        }
    }
}
