//! `gjm watch` – monitor and download stored jobs, optionally resubmitting Failed ones.

use anyhow::Result;
use gjm_core::config::GjmConfig;
use gjm_core::job_db::JobDb;
use std::path::Path;

use crate::cli::{run_pipeline, spawn_summary, start_pipeline};

pub async fn run_watch(
    db: &JobDb,
    cfg: &GjmConfig,
    work_dir: &Path,
    resubmit: bool,
    exit_when_done: bool,
) -> Result<()> {
    let mut pipeline = start_pipeline(db, cfg, work_dir).await?;

    // Resubmitted jobs are admitted first; recovery then skips them.
    if resubmit {
        match pipeline.resubmit_failed().await {
            Ok(ids) if ids.is_empty() => println!("No failed jobs to resubmit."),
            Ok(ids) => println!("Resubmitted {} job(s).", ids.len()),
            Err(e) => {
                tracing::error!("resubmission failed: {:#}", e);
                eprintln!("Resubmission failed: {:#}", e);
            }
        }
    }

    let recovered = pipeline.recover().await?;
    if recovered == 0 && pipeline.jobs_in_flight() == 0 {
        println!("No jobs to watch.");
    }
    spawn_summary(&mut pipeline, cfg);

    run_pipeline(&mut pipeline, exit_when_done).await
}
