//! Grid backend client.
//!
//! The pipeline talks to the remote backend only through [`Backend`]: submit,
//! reschedule, status poll, and output download. Implementations do no
//! retrying of their own; the pipeline stages own the retry policy.

mod dirac;

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::job_db::{JobId, JobStatus};

pub use dirac::DiracCli;

/// Opaque description of one unit of work, handed verbatim to [`Backend::submit`].
///
/// For the DIRAC backend this is the path of a JDL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub description: PathBuf,
}

impl JobSpec {
    pub fn new(description: impl Into<PathBuf>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

impl fmt::Display for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description.display())
    }
}

/// Failure of a single backend call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend answered but refused the request.
    #[error("rejected by backend: {0}")]
    Rejected(String),
    /// The call could not be carried out (process spawn, transport).
    #[error("backend call failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend call timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The reply did not have the expected shape.
    #[error("unexpected backend reply: {0}")]
    Unparseable(String),
    #[error("backend reported unknown status {0:?}")]
    UnknownStatus(String),
}

/// The four remote operations the pipeline depends on.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Submit a job; returns the backend-assigned id.
    async fn submit(&self, spec: &JobSpec) -> Result<JobId, BackendError>;

    /// Ask the backend to run the given jobs again.
    async fn reschedule(&self, ids: &[JobId]) -> Result<(), BackendError>;

    /// Current backend status of a job.
    async fn poll_status(&self, id: JobId) -> Result<JobStatus, BackendError>;

    /// Download the output sandbox into `dest_dir`; returns the directory holding it.
    async fn fetch_output(&self, id: JobId, dest_dir: &Path) -> Result<PathBuf, BackendError>;
}
