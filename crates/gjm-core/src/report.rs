//! Store-wide status summary and the periodic reporter loop.

use anyhow::Result;
use std::fmt;
use std::time::Duration;

use crate::job_db::{JobDb, JobRecord, JobStatus};

/// Per-status job counts at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
    counts: [usize; 7],
    downloaded: usize,
}

fn index(status: JobStatus) -> usize {
    JobStatus::ALL
        .iter()
        .position(|s| *s == status)
        .unwrap_or_default()
}

fn label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Submitted => "S",
        JobStatus::Received => "Rc",
        JobStatus::Waiting => "W",
        JobStatus::Matched => "M",
        JobStatus::Running => "R",
        JobStatus::Done => "D",
        JobStatus::Failed => "F",
    }
}

impl StatusSummary {
    pub fn add(&mut self, record: &JobRecord) {
        self.counts[index(record.status)] += 1;
        if record.downloaded {
            self.downloaded += 1;
        }
    }

    pub fn tally<'a>(records: impl IntoIterator<Item = &'a JobRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.add(record);
        }
        summary
    }

    /// Scan the whole store.
    pub async fn collect(db: &JobDb) -> Result<Self> {
        let mut summary = Self::default();
        let mut scan = db.scan();
        while let Some(record) = scan.next().await? {
            summary.add(&record);
        }
        Ok(summary)
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.counts[index(status)]
    }

    pub fn downloaded(&self) -> usize {
        self.downloaded
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Compact tab-separated line, e.g. `S:   2 Rc:   0 ... F:   1 DL:   4`.
impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for status in JobStatus::ALL {
            write!(f, "{}: {:>3}\t", label(status), self.count(status))?;
        }
        write!(f, "DL: {:>3}", self.downloaded)
    }
}

/// Emit a summary every `interval`, forever. Returns only on a store error.
pub async fn run_reporter<F>(db: JobDb, interval: Duration, emit: F) -> Result<()>
where
    F: Fn(&StatusSummary),
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let summary = StatusSummary::collect(&db).await?;
        tracing::debug!(summary = %summary, "status summary");
        emit(&summary);
    }
}
