//! DIRAC backend driven through the `dirac-wms-*` command-line tools.
//!
//! Each operation runs one command with a timeout and parses its stdout.
//! A non-zero exit status or an `ERROR` line in the output is a rejection.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{Backend, BackendError, JobSpec};
use crate::config::BackendConfig;
use crate::job_db::{JobId, JobStatus};

/// Backend client that shells out to the DIRAC WMS commands.
#[derive(Debug, Clone)]
pub struct DiracCli {
    cfg: BackendConfig,
}

impl DiracCli {
    pub fn new(cfg: BackendConfig) -> Self {
        Self { cfg }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.cfg.command_timeout_secs.max(1))
    }

    /// Run `command_line` (program plus fixed leading args) followed by `args`.
    async fn run(&self, command_line: &str, args: &[OsString]) -> Result<String, BackendError> {
        let mut words = command_line.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| BackendError::Rejected("empty backend command".to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(words)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!(program, ?args, "running backend command");
        let output = tokio::time::timeout(self.timeout(), cmd.output())
            .await
            .map_err(|_| BackendError::Timeout(self.timeout()))??;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let msg = first_non_empty(&stderr)
                .or_else(|| first_non_empty(&stdout))
                .unwrap_or("no output");
            return Err(BackendError::Rejected(format!(
                "{} exited with {}: {}",
                program, output.status, msg
            )));
        }
        check_error_lines(&stdout)?;
        Ok(stdout)
    }
}

fn first_non_empty(s: &str) -> Option<&str> {
    s.lines().map(str::trim).find(|l| !l.is_empty())
}

/// DIRAC tools often exit 0 and report failures as `ERROR: ...` lines.
fn check_error_lines(out: &str) -> Result<(), BackendError> {
    match out.lines().map(str::trim).find(|l| l.starts_with("ERROR")) {
        Some(line) => Err(BackendError::Rejected(line.to_string())),
        None => Ok(()),
    }
}

/// Parse `JobID = 12345` from `dirac-wms-job-submit`.
fn parse_submit_reply(out: &str) -> Result<JobId, BackendError> {
    for line in out.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() == "JobID" {
            return value
                .trim()
                .parse::<JobId>()
                .map_err(|_| BackendError::Unparseable(line.trim().to_string()));
        }
    }
    Err(BackendError::Unparseable(format!(
        "no JobID in submit reply: {}",
        first_non_empty(out).unwrap_or("")
    )))
}

/// Parse the status of `id` from `dirac-wms-job-status`, e.g.
/// `JobID=12345 Status=Running; MinorStatus=Application; Site=LCG.CERN.cern;`.
fn parse_status_reply(out: &str, id: JobId) -> Result<JobStatus, BackendError> {
    let id_token = format!("JobID={}", id);
    let line = out
        .lines()
        .find(|l| l.split_whitespace().any(|t| t.trim_end_matches(';') == id_token))
        .ok_or_else(|| BackendError::Unparseable(format!("no status line for job {}", id)))?;

    let raw = line
        .split(';')
        .flat_map(str::split_whitespace)
        .find_map(|t| t.strip_prefix("Status="))
        .ok_or_else(|| BackendError::Unparseable(line.trim().to_string()))?;

    raw.parse::<JobStatus>()
        .map_err(|_| BackendError::UnknownStatus(raw.to_string()))
}

#[async_trait]
impl Backend for DiracCli {
    async fn submit(&self, spec: &JobSpec) -> Result<JobId, BackendError> {
        let out = self
            .run(
                &self.cfg.submit_command,
                &[spec.description.clone().into_os_string()],
            )
            .await?;
        parse_submit_reply(&out)
    }

    async fn reschedule(&self, ids: &[JobId]) -> Result<(), BackendError> {
        if ids.is_empty() {
            return Ok(());
        }
        let args: Vec<OsString> = ids.iter().map(|id| id.to_string().into()).collect();
        self.run(&self.cfg.reschedule_command, &args).await?;
        Ok(())
    }

    async fn poll_status(&self, id: JobId) -> Result<JobStatus, BackendError> {
        let out = self
            .run(&self.cfg.status_command, &[id.to_string().into()])
            .await?;
        parse_status_reply(&out, id)
    }

    async fn fetch_output(&self, id: JobId, dest_dir: &Path) -> Result<PathBuf, BackendError> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let dest_dir = tokio::fs::canonicalize(dest_dir).await?;
        let args: Vec<OsString> = vec![
            "-D".into(),
            dest_dir.clone().into_os_string(),
            id.to_string().into(),
        ];
        self.run(&self.cfg.output_command, &args).await?;

        // The sandbox lands in <dest>/<id>.
        let out_dir = dest_dir.join(id.to_string());
        if !tokio::fs::try_exists(&out_dir).await? {
            return Err(BackendError::Unparseable(format!(
                "output sandbox of job {} not found at {}",
                id,
                out_dir.display()
            )));
        }
        Ok(out_dir)
    }
}
