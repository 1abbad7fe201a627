use std::path::Path;

use crate::commands::common::{format_backup_lines, format_outcome, write_output, AppContext};
use crate::error::CliError;

pub async fn run_backups_list(ctx: &AppContext, game: i64, as_json: bool) -> Result<(), CliError> {
    let entries = ctx.backup_index()?.list_backups(game).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No backups for game {game}.");
        return Ok(());
    }

    for line in format_backup_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_backups_fetch(
    ctx: &AppContext,
    key: &str,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let snapshot = ctx.backup_index()?.fetch_backup(key).await?;
    write_output(&snapshot.to_json_pretty()?, output_path)
}

/// Wipe-and-replace restore from a stored backup, the newest one by default
pub async fn run_backups_restore(
    ctx: &AppContext,
    game: i64,
    key: Option<&str>,
) -> Result<(), CliError> {
    let index = ctx.backup_index()?;
    let key = match key {
        Some(key) => key.to_string(),
        None => {
            index
                .latest_backup(game)
                .await?
                .ok_or(CliError::NoBackups(game))?
                .key
        }
    };

    let snapshot = index.fetch_backup(&key).await?;
    let outcome = ctx.engine().restore_snapshot(&snapshot).await?;
    println!("{}", format_outcome("Restored", &outcome));
    Ok(())
}

pub async fn run_backups_upload(ctx: &AppContext, match_id: Option<i64>) -> Result<(), CliError> {
    let match_id = ctx.resolve_match(match_id).await?;
    let snapshot = ctx.engine().export_match_data(match_id).await?;
    let key = ctx.backup_index()?.upload_snapshot(&snapshot).await?;
    println!("{key}");
    Ok(())
}
