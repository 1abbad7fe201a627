use scorebook_core::models::{EventRecord, NewEvent, Sequence};
use scorebook_core::scheduler::ContinuousBackup;
use scorebook_core::storage::BackupIndex;
use serde_json::Value;

use crate::commands::common::AppContext;
use crate::error::CliError;

/// Append one scoring event, then run a continuous backup when storage is configured
pub async fn run_event(
    ctx: &AppContext,
    match_id: Option<i64>,
    set_index: i64,
    event_type: &str,
    payload: Option<&str>,
    at: Option<&str>,
) -> Result<EventRecord, CliError> {
    let event = build_event(set_index, event_type, payload, at)?;
    let match_id = ctx.resolve_match(match_id).await?;
    ctx.ensure_writable(match_id, false).await?;

    let record = ctx.db.append_event(match_id, event).await?;
    println!(
        "Event {} recorded at set {} #{}",
        record.id, record.set_index, record.sequence
    );

    match ctx.config.object_store() {
        Ok(store) => {
            let backup =
                ContinuousBackup::new(ctx.engine(), BackupIndex::new(store), ctx.logs.clone());
            backup.trigger(match_id).await.finished().await;
        }
        Err(error) => tracing::debug!("Continuous backup disabled: {}", error),
    }
    Ok(record)
}

pub fn build_event(
    set_index: i64,
    event_type: &str,
    payload: Option<&str>,
    at: Option<&str>,
) -> Result<NewEvent, CliError> {
    let event_type = event_type.trim();
    if event_type.is_empty() {
        return Err(CliError::InvalidEvent("event type cannot be empty".to_string()));
    }
    if set_index < 1 {
        return Err(CliError::InvalidEvent("set index starts at 1".to_string()));
    }

    let payload = match payload.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => serde_json::from_str::<Value>(text)
            .map_err(|error| CliError::InvalidEvent(format!("payload is not JSON: {error}")))?,
        None => Value::Object(serde_json::Map::new()),
    };

    let event = NewEvent::new(set_index, event_type, payload);
    match at {
        Some(text) => {
            let sequence = Sequence::parse_decimal(text).ok_or_else(|| {
                CliError::InvalidEvent(format!("'{text}' is not a sequence number"))
            })?;
            Ok(event.at(sequence))
        }
        None => Ok(event),
    }
}
