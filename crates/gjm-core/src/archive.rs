//! Output archival under the working directory.
//!
//! Downloaded sandboxes are moved (renamed, never copied) into
//! `succeeded/<id>` or `failed/<id>` depending on the job's terminal status.
//! An existing archive entry for the same id is replaced.

use std::io;
use std::path::{Path, PathBuf};

use crate::job_db::{JobId, JobStatus};

pub const SUCCEEDED_DIR: &str = "succeeded";
pub const FAILED_DIR: &str = "failed";

/// Working directory layout: scratch area for downloads plus the two archives.
#[derive(Debug, Clone)]
pub struct Archive {
    work_dir: PathBuf,
}

impl Archive {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    /// Directory the backend downloads sandboxes into.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn succeeded_dir(&self) -> PathBuf {
        self.work_dir.join(SUCCEEDED_DIR)
    }

    pub fn failed_dir(&self) -> PathBuf {
        self.work_dir.join(FAILED_DIR)
    }

    /// Where a (possibly partial) download of `id` sits before archival.
    pub fn scratch_path(&self, id: JobId) -> PathBuf {
        self.work_dir.join(id.to_string())
    }

    /// Archive location of `id` for a terminal status; `None` if not terminal.
    pub fn destination(&self, id: JobId, status: JobStatus) -> Option<PathBuf> {
        let dir = match status {
            JobStatus::Done => self.succeeded_dir(),
            JobStatus::Failed => self.failed_dir(),
            _ => return None,
        };
        Some(dir.join(id.to_string()))
    }

    /// Create `succeeded/` and `failed/` if missing.
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(self.succeeded_dir()).await?;
        tokio::fs::create_dir_all(self.failed_dir()).await?;
        Ok(())
    }

    /// Move a fetched sandbox to `dest`, replacing whatever is there.
    pub async fn file_output(&self, fetched: &Path, dest: &Path) -> io::Result<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        remove_existing(dest).await?;
        tokio::fs::rename(fetched, dest).await
    }

    /// Move a leftover scratch download of `id` into `failed/<id>`.
    /// Returns the new location, or `None` when nothing was left behind.
    pub async fn sweep_partial(&self, id: JobId) -> io::Result<Option<PathBuf>> {
        let scratch = self.scratch_path(id);
        if !tokio::fs::try_exists(&scratch).await? {
            return Ok(None);
        }
        let dest = self.failed_dir().join(id.to_string());
        self.file_output(&scratch, &dest).await?;
        Ok(Some(dest))
    }
}

async fn remove_existing(path: &Path) -> io::Result<()> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
