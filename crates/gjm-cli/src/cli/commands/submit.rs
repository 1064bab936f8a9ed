//! `gjm submit` – submit JDL files and follow the jobs to download.

use anyhow::Result;
use gjm_core::backend::JobSpec;
use gjm_core::config::GjmConfig;
use gjm_core::job_db::JobDb;
use std::path::{Path, PathBuf};

use crate::cli::{run_pipeline, spawn_summary, start_pipeline};

pub async fn run_submit(
    db: &JobDb,
    cfg: &GjmConfig,
    work_dir: &Path,
    jdl: Vec<PathBuf>,
    exit_when_done: bool,
) -> Result<()> {
    let mut pipeline = start_pipeline(db, cfg, work_dir).await?;
    pipeline.recover().await?;

    let handles: Vec<_> = jdl
        .into_iter()
        .map(|path| {
            let spec = JobSpec::new(path);
            (spec.clone(), pipeline.submit(spec))
        })
        .collect();
    spawn_summary(&mut pipeline, cfg);

    // A failing worker ends the wait with its error instead of leaving handles pending.
    pipeline
        .run_until(async {
            let mut rejected = 0usize;
            for (spec, handle) in handles {
                match handle.wait().await {
                    Ok(id) => println!("Submitted job {} ({})", id, spec),
                    Err(e) => {
                        rejected += 1;
                        eprintln!("Could not submit {}: {}", spec, e);
                    }
                }
            }
            if rejected > 0 {
                tracing::warn!(rejected, "some job descriptions were not submitted");
            }
        })
        .await?;

    run_pipeline(&mut pipeline, exit_when_done).await
}
