//! Sets and events of a match

use libsql::{Connection, Row, Value};

use super::values::{self, flag, json_column, text_or_null};
use crate::error::Result;
use crate::models::{EventRecord, MatchId, NewEvent, Sequence, SetRecord};
use crate::util::iso_now;

const SET_COLUMNS: &str = "id, match_id, set_index, team1_points, team2_points, finished, \
    start_time, end_time, external_id";
const EVENT_COLUMNS: &str =
    "id, match_id, set_index, sequence, event_type, payload, ts, external_id";

/// Set and event storage.
///
/// Events are append-only outside of restores: nothing here rewrites an
/// existing event row.
pub struct LibSqlScoringRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlScoringRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_set(row: &Row) -> Result<SetRecord> {
        Ok(SetRecord {
            id: values::int(row, 0)?,
            match_id: MatchId(values::int(row, 1)?),
            index: values::int(row, 2)?,
            team1_points: values::int(row, 3)?,
            team2_points: values::int(row, 4)?,
            finished: values::boolean(row, 5)?,
            start_time: values::opt_text(row, 6)?,
            end_time: values::opt_text(row, 7)?,
            external_id: values::opt_text(row, 8)?,
        })
    }

    fn parse_event(row: &Row) -> Result<EventRecord> {
        Ok(EventRecord {
            id: values::int(row, 0)?,
            match_id: MatchId(values::int(row, 1)?),
            set_index: values::int(row, 2)?,
            sequence: Sequence::from_scaled(values::int(row, 3)?),
            event_type: values::text(row, 4)?,
            payload: values::json(row, 5)?,
            ts: values::opt_text(row, 6)?,
            external_id: values::opt_text(row, 7)?,
        })
    }

    /// Insert a set for `match_id`, ignoring the set's own id
    pub async fn insert_set(&self, match_id: MatchId, set: &SetRecord) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO sets (match_id, set_index, team1_points, team2_points, finished,
                    start_time, end_time, external_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                vec![
                    Value::Integer(match_id.get()),
                    Value::Integer(set.index),
                    Value::Integer(set.team1_points),
                    Value::Integer(set.team2_points),
                    flag(set.finished),
                    text_or_null(set.start_time.as_deref()),
                    text_or_null(set.end_time.as_deref()),
                    text_or_null(set.external_id.as_deref()),
                ],
            )
            .await?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Update points and completion of a stored set
    pub async fn update_set(&self, set: &SetRecord) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sets SET team1_points = ?, team2_points = ?, finished = ?,
                    start_time = ?, end_time = ?
                 WHERE id = ?",
                vec![
                    Value::Integer(set.team1_points),
                    Value::Integer(set.team2_points),
                    flag(set.finished),
                    text_or_null(set.start_time.as_deref()),
                    text_or_null(set.end_time.as_deref()),
                    Value::Integer(set.id),
                ],
            )
            .await?;
        Ok(())
    }

    /// Sets of a match ordered by index
    pub async fn list_sets(&self, match_id: MatchId) -> Result<Vec<SetRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SET_COLUMNS} FROM sets WHERE match_id = ? ORDER BY set_index, id"
                ),
                vec![Value::Integer(match_id.get())],
            )
            .await?;
        let mut sets = Vec::new();
        while let Some(row) = rows.next().await? {
            sets.push(Self::parse_set(&row)?);
        }
        Ok(sets)
    }

    /// Store an event exactly as given (restore and import paths)
    pub async fn insert_event(&self, match_id: MatchId, event: &EventRecord) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO events (match_id, set_index, sequence, event_type, payload, ts, external_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                vec![
                    Value::Integer(match_id.get()),
                    Value::Integer(event.set_index),
                    Value::Integer(event.sequence.scaled()),
                    Value::Text(event.event_type.clone()),
                    json_column(&event.payload)?,
                    text_or_null(event.ts.as_deref()),
                    text_or_null(event.external_id.as_deref()),
                ],
            )
            .await?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Highest sequence used in one set of a match
    pub async fn last_sequence(&self, match_id: MatchId, set_index: i64) -> Result<Option<Sequence>> {
        let mut rows = self
            .conn
            .query(
                "SELECT MAX(sequence) FROM events WHERE match_id = ? AND set_index = ?",
                vec![Value::Integer(match_id.get()), Value::Integer(set_index)],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(values::opt_int(&row, 0)?.map(Sequence::from_scaled)),
            None => Ok(None),
        }
    }

    /// Append a scoring event.
    ///
    /// Without an explicit sequence the event lands on the next whole number
    /// after the set's current maximum (`1` for an empty set).
    pub async fn append_event(&self, match_id: MatchId, event: NewEvent) -> Result<EventRecord> {
        let sequence = match event.sequence {
            Some(sequence) => sequence,
            None => self
                .last_sequence(match_id, event.set_index)
                .await?
                .map_or(Sequence::from_integer(1), Sequence::next_integer),
        };
        let mut record = EventRecord {
            id: 0,
            match_id,
            set_index: event.set_index,
            sequence,
            ts: Some(event.ts.unwrap_or_else(iso_now)),
            event_type: event.event_type,
            payload: event.payload,
            external_id: None,
        };
        record.id = self.insert_event(match_id, &record).await?;
        Ok(record)
    }

    /// Events of a match in `(set_index, sequence)` order
    pub async fn list_events(&self, match_id: MatchId) -> Result<Vec<EventRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events WHERE match_id = ?
                     ORDER BY set_index, sequence, id"
                ),
                vec![Value::Integer(match_id.get())],
            )
            .await?;
        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            events.push(Self::parse_event(&row)?);
        }
        Ok(events)
    }

    /// Drop the sets and events of one match
    pub async fn delete_for_match(&self, match_id: MatchId) -> Result<()> {
        let id = Value::Integer(match_id.get());
        self.conn
            .execute("DELETE FROM events WHERE match_id = ?", vec![id.clone()])
            .await?;
        self.conn
            .execute("DELETE FROM sets WHERE match_id = ?", vec![id])
            .await?;
        Ok(())
    }

    /// Drop every set and event on the device
    pub async fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM events", ()).await?;
        self.conn.execute("DELETE FROM sets", ()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlMatchRepository, MatchRepository};
    use crate::models::{Match, LINEUP};
    use serde_json::json;

    async fn setup() -> (Database, MatchId) {
        let db = Database::open_in_memory().await.unwrap();
        let id = LibSqlMatchRepository::new(db.connection())
            .insert(&Match::default())
            .await
            .unwrap();
        (db, id)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_append_assigns_next_whole_sequence_per_set() {
        let (db, match_id) = setup().await;
        let repo = LibSqlScoringRepository::new(db.connection());

        let first = repo
            .append_event(match_id, NewEvent::new(1, "point", json!({"team": "team1"})))
            .await
            .unwrap();
        let second = repo
            .append_event(match_id, NewEvent::new(1, "point", json!({"team": "team2"})))
            .await
            .unwrap();
        let other_set = repo
            .append_event(match_id, NewEvent::new(2, "point", json!({})))
            .await
            .unwrap();

        assert_eq!(first.sequence, Sequence::from_integer(1));
        assert_eq!(second.sequence, Sequence::from_integer(2));
        assert_eq!(other_set.sequence, Sequence::from_integer(1));
        assert!(first.ts.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fractional_event_is_listed_between_neighbours() {
        let (db, match_id) = setup().await;
        let repo = LibSqlScoringRepository::new(db.connection());

        repo.append_event(match_id, NewEvent::new(1, "point", json!({})))
            .await
            .unwrap();
        repo.append_event(match_id, NewEvent::new(1, "point", json!({})))
            .await
            .unwrap();
        repo.append_event(
            match_id,
            NewEvent::new(1, LINEUP, json!({})).at(Sequence::new(1, 500_000)),
        )
        .await
        .unwrap();

        let events = repo.list_events(match_id).await.unwrap();
        let order: Vec<String> = events.iter().map(|e| e.sequence.to_string()).collect();
        assert_eq!(order, vec!["1", "1.5", "2"]);
        assert_eq!(events[1].event_type, LINEUP);

        // next whole number after a fractional maximum
        let next = repo
            .append_event(match_id, NewEvent::new(1, "point", json!({})))
            .await
            .unwrap();
        assert_eq!(next.sequence, Sequence::from_integer(3));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sets_round_trip_and_delete() {
        let (db, match_id) = setup().await;
        let repo = LibSqlScoringRepository::new(db.connection());

        let set = SetRecord {
            team1_points: 21,
            team2_points: 19,
            finished: true,
            ..SetRecord::new(1)
        };
        let set_id = repo.insert_set(match_id, &set).await.unwrap();
        repo.insert_set(match_id, &SetRecord::new(2)).await.unwrap();

        let sets = repo.list_sets(match_id).await.unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(
            sets[0],
            SetRecord {
                id: set_id,
                match_id,
                ..set
            }
        );

        repo.delete_for_match(match_id).await.unwrap();
        assert!(repo.list_sets(match_id).await.unwrap().is_empty());
    }
}
