//! `gjm status` – show all stored jobs.

use anyhow::Result;
use gjm_core::job_db::JobDb;
use gjm_core::report::StatusSummary;

pub async fn run_status(db: &JobDb) -> Result<()> {
    let jobs = db.list_all().await?;
    if jobs.is_empty() {
        println!("No jobs in database.");
        return Ok(());
    }
    println!("{:<12} {:<10} {:<10} {}", "ID", "STATUS", "DOWNLOADED", "RETRIES");
    for j in &jobs {
        println!(
            "{:<12} {:<10} {:<10} {}",
            j.id,
            j.status.as_str(),
            if j.downloaded { "yes" } else { "no" },
            j.download_retries
        );
    }
    println!("{}", StatusSummary::tally(&jobs));
    Ok(())
}
