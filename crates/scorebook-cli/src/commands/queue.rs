use scorebook_core::cloud::push_restore_jobs;
use scorebook_core::models::SyncStatus;

use crate::cli::QueueStatus;
use crate::commands::common::{format_job_lines, AppContext};
use crate::error::CliError;

pub const fn sync_status(status: QueueStatus) -> SyncStatus {
    match status {
        QueueStatus::Queued => SyncStatus::Queued,
        QueueStatus::Sent => SyncStatus::Sent,
        QueueStatus::Failed => SyncStatus::Failed,
    }
}

pub async fn run_queue_list(
    ctx: &AppContext,
    status: Option<QueueStatus>,
    as_json: bool,
) -> Result<(), CliError> {
    let jobs = ctx.db.list_sync_jobs(status.map(sync_status)).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("Sync queue is empty.");
        return Ok(());
    }

    for line in format_job_lines(&jobs) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_queue_push(ctx: &AppContext) -> Result<(), CliError> {
    let store = ctx.config.row_store()?;
    let report = push_restore_jobs(&ctx.db, &store).await?;
    println!("Sent {}, failed {}", report.sent, report.failed);
    Ok(())
}
