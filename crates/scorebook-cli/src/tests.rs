use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use scorebook_core::backup::RestoreOutcome;
use scorebook_core::config::AppConfig;
use scorebook_core::models::{Match, Sequence, SyncJob, SyncStatus};
use scorebook_core::scheduler::LogBuffer;
use scorebook_core::session::SessionStatus;
use scorebook_core::{FailureCategory, MatchId};
use serde_json::json;

use crate::cli::QueueStatus;
use crate::commands::common::{
    format_job_lines, format_outcome, read_document, resolve_db_path, AppContext,
};
use crate::commands::event::{build_event, run_event};
use crate::commands::export::run_export;
use crate::commands::queue::sync_status;
use crate::commands::restore::{run_restore, run_restore_in_place};
use crate::commands::session::describe_status;
use crate::error::CliError;

fn config(backup_dir: Option<PathBuf>) -> AppConfig {
    AppConfig {
        db_path: None,
        backup_dir,
        sport_type: "beach".to_string(),
        r2: None,
        supabase: None,
    }
}

async fn open_context(dir: &Path, backup_dir: Option<PathBuf>) -> AppContext {
    AppContext::open(config(backup_dir), &dir.join("data/scorebook.db"), LogBuffer::new())
        .await
        .unwrap()
}

async fn create_current_match(ctx: &AppContext, game_number: i64) -> MatchId {
    ctx.db
        .create_match(&Match {
            external_id: Some(format!("ext-{game_number}")),
            game_number: Some(game_number),
            ..Match::default()
        })
        .await
        .unwrap()
}

#[test]
fn db_path_prefers_flag_then_environment() {
    let mut config = config(None);
    config.db_path = Some(PathBuf::from("/env/scorebook.db"));

    assert_eq!(
        resolve_db_path(Some(PathBuf::from("/flag.db")), &config),
        PathBuf::from("/flag.db")
    );
    assert_eq!(
        resolve_db_path(None, &config),
        PathBuf::from("/env/scorebook.db")
    );

    config.db_path = None;
    assert!(resolve_db_path(None, &config).ends_with("scorebook/scorebook.db"));
}

#[test]
fn build_event_parses_payload_and_position() {
    let event = build_event(2, " point ", Some(r#"{"team":"team1"}"#), Some("3.5")).unwrap();
    assert_eq!(event.set_index, 2);
    assert_eq!(event.event_type, "point");
    assert_eq!(event.payload, json!({"team": "team1"}));
    assert_eq!(event.sequence, Some(Sequence::new(3, 500_000)));

    let empty = build_event(1, "timeout", None, None).unwrap();
    assert_eq!(empty.payload, json!({}));
    assert_eq!(empty.sequence, None);
}

#[test]
fn build_event_rejects_bad_input() {
    assert!(matches!(build_event(1, " ", None, None), Err(CliError::InvalidEvent(_))));
    assert!(matches!(build_event(0, "point", None, None), Err(CliError::InvalidEvent(_))));
    assert!(matches!(
        build_event(1, "point", Some("{not json"), None),
        Err(CliError::InvalidEvent(_))
    ));
    assert!(matches!(
        build_event(1, "point", None, Some("later")),
        Err(CliError::InvalidEvent(_))
    ));
}

#[test]
fn outcome_line_mentions_the_cloud_job() {
    let outcome = RestoreOutcome {
        match_id: MatchId(3),
        sets: 2,
        events: 40,
        lineup_events: 2,
        sync_job_id: Some(9),
    };
    assert_eq!(
        format_outcome("Restored", &outcome),
        "Restored match 3: 2 sets, 40 events (2 lineup), cloud job 9 queued"
    );

    let outcome = RestoreOutcome {
        sync_job_id: None,
        ..outcome
    };
    assert!(format_outcome("Imported", &outcome).ends_with("no cloud job"));
}

#[test]
fn job_lines_include_status_and_action() {
    let job = SyncJob {
        id: 4,
        resource: "match".to_string(),
        action: "restore".to_string(),
        payload: json!({}),
        ts: "2024-05-01T10:00:00.000Z".to_string(),
        status: SyncStatus::Failed,
    };
    let lines = format_job_lines(&[job]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("failed"));
    assert!(lines[0].contains("match/restore"));
}

#[test]
fn queue_status_maps_to_sync_status() {
    assert_eq!(sync_status(QueueStatus::Queued), SyncStatus::Queued);
    assert_eq!(sync_status(QueueStatus::Failed), SyncStatus::Failed);
}

#[test]
fn status_descriptions() {
    assert_eq!(describe_status(&SessionStatus::default()), "unlocked");
    let other = SessionStatus {
        locked: true,
        session_id: Some("abc-def-ghi".to_string()),
        is_current_session: false,
    };
    assert_eq!(describe_status(&other), "locked by session abc-def-ghi");
}

#[test]
fn unreadable_documents_are_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ nope").unwrap();

    let error = read_document(&path).unwrap_err();
    let CliError::Core(core) = &error else {
        panic!("expected core error, got {error:?}");
    };
    assert_eq!(core.category(), FailureCategory::BadFile);
    assert!(error.hint().is_some());
}

#[tokio::test(flavor = "current_thread")]
async fn export_then_restore_round_trips_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = open_context(dir.path(), None).await;
    let id = create_current_match(&ctx, 7).await;
    run_event(&ctx, Some(id.get()), 1, "point", Some(r#"{"team":"team1"}"#), None)
        .await
        .unwrap();

    let file = dir.path().join("backup.json");
    run_export(&ctx, None, Some(&file)).await.unwrap();
    let outcome = run_restore(&ctx, &file).await.unwrap();

    assert_eq!(outcome.events, 1);
    assert!(outcome.sync_job_id.is_some());
    let events = ctx.db.list_events(outcome.match_id).await.unwrap();
    assert_eq!(events[0].event_type, "point");
}

#[tokio::test(flavor = "current_thread")]
async fn events_upload_a_backup_when_storage_is_configured() {
    let dir = tempfile::tempdir().unwrap();
    let backups = dir.path().join("backups");
    let ctx = open_context(dir.path(), Some(backups.clone())).await;
    let id = create_current_match(&ctx, 21).await;

    run_event(&ctx, Some(id.get()), 1, "point", None, None)
        .await
        .unwrap();

    let entries = ctx.backup_index().unwrap().list_backups(21).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(backups.join(&entries[0].key).exists());
}

#[tokio::test(flavor = "current_thread")]
async fn locked_matches_refuse_writes_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = open_context(dir.path(), None).await;
    let id = create_current_match(&ctx, 3).await;
    let file = dir.path().join("backup.json");
    run_export(&ctx, Some(id.get()), Some(&file)).await.unwrap();

    ctx.db
        .set_match_session(id, Some("other-device-1"))
        .await
        .unwrap();

    let refused = run_restore_in_place(&ctx, id.get(), &file, false).await;
    assert!(matches!(refused, Err(CliError::MatchLocked { .. })));
    let refused = run_event(&ctx, None, 1, "point", None, None).await;
    assert!(matches!(refused, Err(CliError::MatchLocked { .. })));

    let outcome = run_restore_in_place(&ctx, id.get(), &file, true).await.unwrap();
    assert_eq!(outcome.match_id, id);
}

#[tokio::test(flavor = "current_thread")]
async fn missing_matches_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = open_context(dir.path(), None).await;

    assert!(matches!(
        ctx.resolve_match(None).await,
        Err(CliError::NoCurrentMatch)
    ));
    assert!(matches!(
        ctx.resolve_match(Some(42)).await,
        Err(CliError::MatchNotFound(42))
    ));
}
