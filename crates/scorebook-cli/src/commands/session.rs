use scorebook_core::session::SessionStatus;

use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_session_id(ctx: &AppContext) -> Result<(), CliError> {
    println!("{}", ctx.sessions().session_id().await?);
    Ok(())
}

pub async fn run_session_reset(ctx: &AppContext) -> Result<(), CliError> {
    ctx.sessions().reset().await?;
    println!("Session id cleared; a new one is created on next use.");
    Ok(())
}

pub async fn run_session_status(
    ctx: &AppContext,
    match_id: Option<i64>,
    as_json: bool,
) -> Result<(), CliError> {
    let match_id = ctx.resolve_match(match_id).await?;
    let status = ctx.sessions().check_match_session(Some(match_id)).await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Match {match_id}: {}", describe_status(&status));
    }
    Ok(())
}

pub fn describe_status(status: &SessionStatus) -> String {
    match (&status.session_id, status.is_current_session) {
        (None, _) => "unlocked".to_string(),
        (Some(_), true) => "held by this device".to_string(),
        (Some(other), false) => format!("locked by session {other}"),
    }
}

pub async fn run_session_lock(ctx: &AppContext, match_id: Option<i64>) -> Result<(), CliError> {
    let match_id = ctx.resolve_match(match_id).await?;
    if !ctx.sessions().lock_match_session(Some(match_id)).await {
        return Err(CliError::LockFailed(match_id.get()));
    }
    println!("Match {match_id} locked to this device");
    Ok(())
}

pub async fn run_session_unlock(ctx: &AppContext, match_id: Option<i64>) -> Result<(), CliError> {
    let match_id = ctx.resolve_match(match_id).await?;
    if !ctx.sessions().unlock_match_session(Some(match_id)).await {
        return Err(CliError::LockFailed(match_id.get()));
    }
    println!("Match {match_id} unlocked");
    Ok(())
}

pub async fn run_pin(ctx: &AppContext, match_id: i64, pin: &str) -> Result<(), CliError> {
    let match_id = ctx.resolve_match(Some(match_id)).await?;
    if ctx.sessions().verify_game_pin(Some(match_id), pin).await {
        println!("PIN accepted");
        Ok(())
    } else {
        Err(CliError::PinRejected(match_id.get()))
    }
}
