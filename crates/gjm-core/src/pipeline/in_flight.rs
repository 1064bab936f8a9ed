//! Live-pipeline membership.
//!
//! Tracks which job ids currently own a queue slot (at most one each) plus
//! submissions not yet answered by the backend. Admission is refused for an
//! id already in flight, which keeps recovery and resubmission from putting a
//! second copy of a record into the pipeline.

use std::collections::BTreeSet;
use tokio::sync::watch;

use crate::job_db::JobId;

#[derive(Debug, Default, Clone)]
struct Occupancy {
    jobs: BTreeSet<JobId>,
    submissions: usize,
}

impl Occupancy {
    fn is_idle(&self) -> bool {
        self.jobs.is_empty() && self.submissions == 0
    }
}

pub(crate) struct InFlight {
    state: watch::Sender<Occupancy>,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(Occupancy::default());
        Self { state }
    }

    /// Claim a slot for `id`. Returns false if the id is already in flight.
    pub(crate) fn admit(&self, id: JobId) -> bool {
        self.state.send_if_modified(|o| o.jobs.insert(id))
    }

    /// The job left the pipeline (archived, exhausted, or lost to a fatal error).
    pub(crate) fn release(&self, id: JobId) {
        self.state.send_if_modified(|o| o.jobs.remove(&id));
    }

    pub(crate) fn contains(&self, id: JobId) -> bool {
        self.state.borrow().jobs.contains(&id)
    }

    pub(crate) fn begin_submission(&self) {
        self.state.send_modify(|o| o.submissions += 1);
    }

    /// A submission was answered; on success the caller admits the new id first.
    pub(crate) fn end_submission(&self) {
        self.state.send_modify(|o| o.submissions = o.submissions.saturating_sub(1));
    }

    pub(crate) fn job_count(&self) -> usize {
        self.state.borrow().jobs.len()
    }

    /// Resolve once no job and no submission is in flight.
    pub(crate) async fn wait_idle(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel stays open while we wait.
        let _ = rx.wait_for(Occupancy::is_idle).await;
    }
}
