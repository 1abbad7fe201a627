use std::path::Path;

use crate::commands::common::{write_output, AppContext};
use crate::error::CliError;

pub async fn run_export(
    ctx: &AppContext,
    match_id: Option<i64>,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let match_id = ctx.resolve_match(match_id).await?;
    let snapshot = ctx.engine().export_match_data(match_id).await?;
    write_output(&snapshot.to_json_pretty()?, output_path)
}
