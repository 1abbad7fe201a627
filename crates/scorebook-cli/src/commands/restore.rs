use std::path::Path;

use scorebook_core::backup::RestoreOutcome;

use crate::commands::common::{format_outcome, read_document, AppContext};
use crate::error::CliError;

/// Wipe-and-replace restore from a file
pub async fn run_restore(ctx: &AppContext, file: &Path) -> Result<RestoreOutcome, CliError> {
    let document = read_document(file)?;
    let outcome = ctx.engine().restore_match_from_json(document).await?;
    println!("{}", format_outcome("Restored", &outcome));
    Ok(outcome)
}

pub async fn run_restore_in_place(
    ctx: &AppContext,
    match_id: i64,
    file: &Path,
    force: bool,
) -> Result<RestoreOutcome, CliError> {
    let match_id = ctx.resolve_match(Some(match_id)).await?;
    ctx.ensure_writable(match_id, force).await?;

    let document = read_document(file)?;
    let outcome = ctx
        .engine()
        .restore_match_in_place(match_id, document)
        .await?;
    println!("{}", format_outcome("Restored", &outcome));
    Ok(outcome)
}

pub async fn run_import(ctx: &AppContext, pin: &str, game: Option<i64>) -> Result<(), CliError> {
    let store = ctx.config.row_store()?;
    let outcome = ctx.engine().import_match_by_pin(&store, pin, game).await?;
    println!("{}", format_outcome("Imported", &outcome));
    Ok(())
}
