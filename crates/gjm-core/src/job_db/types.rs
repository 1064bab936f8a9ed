//! Types used by the job database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend-assigned job identifier.
pub type JobId = i64;

/// Job status as reported by the grid backend. Stored verbatim (e.g. `"Running"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobStatus {
    Submitted,
    Received,
    Waiting,
    Matched,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    /// All statuses in lifecycle order (used by the summary line).
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Submitted,
        JobStatus::Received,
        JobStatus::Waiting,
        JobStatus::Matched,
        JobStatus::Running,
        JobStatus::Done,
        JobStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Submitted => "Submitted",
            JobStatus::Received => "Received",
            JobStatus::Waiting => "Waiting",
            JobStatus::Matched => "Matched",
            JobStatus::Running => "Running",
            JobStatus::Done => "Done",
            JobStatus::Failed => "Failed",
        }
    }

    /// Done and Failed: no further backend-side progress expected.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status string outside the known backend vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// The persisted job record, stored as JSON keyed by `id`.
///
/// Unknown fields are ignored on load so newer writers stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub downloaded: bool,
    #[serde(default)]
    pub download_retries: u32,
}

impl JobRecord {
    /// Record for a freshly submitted job.
    pub fn submitted(id: JobId, download_retries: u32) -> Self {
        Self {
            id,
            status: JobStatus::Submitted,
            downloaded: false,
            download_retries,
        }
    }

    /// Check the record invariants after loading it from the database.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.downloaded && !self.status.is_terminal() {
            return Err(RecordError::DownloadedNotTerminal {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}

/// A stored record that could not be decoded or violates an invariant.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("job {id}: malformed record: {source}")]
    Malformed {
        id: JobId,
        #[source]
        source: serde_json::Error,
    },
    #[error("job {key}: record carries id {found}")]
    KeyMismatch { key: JobId, found: JobId },
    #[error("job {id}: marked downloaded while {status}")]
    DownloadedNotTerminal { id: JobId, status: JobStatus },
}
