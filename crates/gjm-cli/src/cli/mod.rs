//! CLI for the GJM grid job manager.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use gjm_core::backend::{Backend, DiracCli};
use gjm_core::config::{self, GjmConfig};
use gjm_core::job_db::JobDb;
use gjm_core::pipeline::{Pipeline, PipelineSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use commands::{run_completions, run_status, run_submit, run_watch};

/// Top-level CLI for the GJM grid job manager.
#[derive(Debug, Parser)]
#[command(name = "gjm")]
#[command(about = "GJM: submit, monitor and collect grid jobs", long_about = None)]
pub struct Cli {
    /// Working directory holding jobs.db, succeeded/ and failed/ (default: current directory).
    #[arg(long, global = true, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Submit job descriptions (JDL files) and follow them until downloaded.
    Submit {
        /// One or more JDL files.
        #[arg(required = true, value_name = "JDL")]
        jdl: Vec<PathBuf>,

        /// Stop once every job is downloaded instead of waiting for Ctrl-C.
        #[arg(long)]
        exit_when_done: bool,
    },

    /// Monitor and download every stored job that is not downloaded yet.
    Watch {
        /// Reschedule all Failed jobs before watching.
        #[arg(short, long)]
        resubmit: bool,

        /// Stop once no job is left in flight instead of waiting for Ctrl-C.
        #[arg(long)]
        exit_when_done: bool,
    },

    /// Show all stored jobs and a status summary.
    Status,

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        if let CliCommand::Completions { shell } = cli.command {
            return run_completions(shell);
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let work_dir = match cli.work_dir {
            Some(dir) => dir,
            None => std::env::current_dir().context("current directory")?,
        };
        let db = JobDb::open_in(&work_dir).await?;

        match cli.command {
            CliCommand::Submit {
                jdl,
                exit_when_done,
            } => run_submit(&db, &cfg, &work_dir, jdl, exit_when_done).await?,
            CliCommand::Watch {
                resubmit,
                exit_when_done,
            } => run_watch(&db, &cfg, &work_dir, resubmit, exit_when_done).await?,
            CliCommand::Status => run_status(&db).await?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

/// Start a pipeline over `db` driven by the DIRAC command-line tools.
pub(crate) async fn start_pipeline(db: &JobDb, cfg: &GjmConfig, work_dir: &Path) -> Result<Pipeline> {
    let backend: Arc<dyn Backend> = Arc::new(DiracCli::new(cfg.backend.clone().unwrap_or_default()));
    Pipeline::start(db.clone(), backend, work_dir, PipelineSettings::from(cfg)).await
}

/// Print the status summary every `report_interval_secs`.
pub(crate) fn spawn_summary(pipeline: &mut Pipeline, cfg: &GjmConfig) {
    pipeline.spawn_reporter(cfg.report_interval(), |summary| println!("{}", summary));
}

/// Drive the pipeline until it is idle (`exit_when_done`) or until Ctrl-C.
pub(crate) async fn run_pipeline(pipeline: &mut Pipeline, exit_when_done: bool) -> Result<()> {
    if exit_when_done {
        tokio::select! {
            res = pipeline.wait_idle() => res?,
            _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
        }
    } else {
        pipeline
            .run_until(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        tracing::info!("interrupted");
    }
    Ok(())
}

#[cfg(test)]
mod tests;
