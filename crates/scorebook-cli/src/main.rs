//! Scorebook CLI - score matches offline, back them up, restore them anywhere

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use scorebook_core::config::AppConfig;
use scorebook_core::scheduler::LogBuffer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::{BackupCommands, Cli, Commands, QueueCommands, SessionCommands};
use crate::commands::backups::{
    run_backups_fetch, run_backups_list, run_backups_restore, run_backups_upload,
};
use crate::commands::common::{resolve_db_path, AppContext};
use crate::commands::event::run_event;
use crate::commands::export::run_export;
use crate::commands::queue::{run_queue_list, run_queue_push};
use crate::commands::restore::{run_import, run_restore, run_restore_in_place};
use crate::commands::session::{
    run_pin, run_session_id, run_session_lock, run_session_reset, run_session_status,
    run_session_unlock,
};
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        if let Some(hint) = error.hint() {
            eprintln!("Hint: {hint}");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let logs = LogBuffer::new();
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "scorebook=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr.and(logs.clone()))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let db_path = resolve_db_path(cli.db_path, &config);
    let ctx = AppContext::open(config, &db_path, logs).await?;

    match cli.command {
        Commands::Export { match_id, output } => {
            run_export(&ctx, match_id, output.as_deref()).await?;
        }
        Commands::Restore { file } => {
            run_restore(&ctx, &file).await?;
        }
        Commands::RestoreInPlace {
            match_id,
            file,
            force,
        } => {
            run_restore_in_place(&ctx, match_id, &file, force).await?;
        }
        Commands::Import { pin, game } => run_import(&ctx, &pin, game).await?,
        Commands::Backups { command } => match command {
            BackupCommands::List { game, json } => run_backups_list(&ctx, game, json).await?,
            BackupCommands::Fetch { key, output } => {
                run_backups_fetch(&ctx, &key, output.as_deref()).await?;
            }
            BackupCommands::Restore { game, key } => {
                run_backups_restore(&ctx, game, key.as_deref()).await?;
            }
            BackupCommands::Upload { match_id } => run_backups_upload(&ctx, match_id).await?,
        },
        Commands::Session { command } => match command {
            SessionCommands::Id => run_session_id(&ctx).await?,
            SessionCommands::Reset => run_session_reset(&ctx).await?,
            SessionCommands::Status { match_id, json } => {
                run_session_status(&ctx, match_id, json).await?;
            }
            SessionCommands::Lock { match_id } => run_session_lock(&ctx, match_id).await?,
            SessionCommands::Unlock { match_id } => run_session_unlock(&ctx, match_id).await?,
        },
        Commands::Pin { match_id, pin } => run_pin(&ctx, match_id, &pin).await?,
        Commands::Queue { command } => match command {
            QueueCommands::List { status, json } => run_queue_list(&ctx, status, json).await?,
            QueueCommands::Push => run_queue_push(&ctx).await?,
        },
        Commands::Event {
            event_type,
            match_id,
            set,
            payload,
            at,
        } => {
            run_event(
                &ctx,
                match_id,
                set,
                &event_type,
                payload.as_deref(),
                at.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}
