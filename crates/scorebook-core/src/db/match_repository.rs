//! Match repository implementation

use libsql::{Connection, Row, Value};

use super::values::{self, flag, int_or_null, map_column, text_or_null};
use crate::error::{Error, Result};
use crate::models::{CoinToss, Match, MatchId, MatchStatus};
use crate::util::iso_now;

const MATCH_COLUMNS: &str = "id, external_id, status, team1_id, team2_id, scheduled_at, \
    game_number, game_pin, session_id, is_test, coin_toss, extra";

/// Trait for match storage operations (async)
#[allow(async_fn_in_trait)]
pub trait MatchRepository {
    /// Insert a match; an assigned id is kept, otherwise one is allocated
    async fn insert(&self, game: &Match) -> Result<MatchId>;

    /// Get a match by local id
    async fn get(&self, id: MatchId) -> Result<Option<Match>>;

    /// Find a match by its cloud identity
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Match>>;

    /// Overwrite the mutable fields of an existing match.
    ///
    /// A stored external id is never replaced.
    async fn update(&self, game: &Match) -> Result<()>;

    /// All matches, oldest first
    async fn list(&self) -> Result<Vec<Match>>;

    /// Set or clear the exclusive-edit claim; `false` when the match is missing
    async fn set_session(&self, id: MatchId, session_id: Option<&str>) -> Result<bool>;

    /// Remove every match (sets, events and the current slot cascade)
    async fn clear(&self) -> Result<()>;
}

/// libSQL implementation of `MatchRepository`
pub struct LibSqlMatchRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlMatchRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_match(row: &Row) -> Result<Match> {
        let coin_toss = match values::json(row, 10)? {
            serde_json::Value::Null => None,
            value => Some(serde_json::from_value::<CoinToss>(value)?),
        };
        Ok(Match {
            id: MatchId(values::int(row, 0)?),
            external_id: values::opt_text(row, 1)?,
            status: MatchStatus::from(values::text(row, 2)?),
            team1_id: values::opt_int(row, 3)?,
            team2_id: values::opt_int(row, 4)?,
            scheduled_at: values::opt_text(row, 5)?,
            game_number: values::opt_int(row, 6)?,
            game_pin: values::opt_text(row, 7)?,
            session_id: values::opt_text(row, 8)?,
            test: values::boolean(row, 9)?,
            coin_toss,
            extra: values::json_map(row, 11)?,
        })
    }

    fn coin_toss_column(game: &Match) -> Result<Value> {
        game.coin_toss.as_ref().map_or(Ok(Value::Null), |toss| {
            Ok(Value::Text(serde_json::to_string(toss)?))
        })
    }

    async fn query_one(&self, sql: &str, params: Vec<Value>) -> Result<Option<Match>> {
        let mut rows = self.conn.query(sql, params).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_match(&row)?)),
            None => Ok(None),
        }
    }
}

impl MatchRepository for LibSqlMatchRepository<'_> {
    async fn insert(&self, game: &Match) -> Result<MatchId> {
        let now = iso_now();
        let id = if game.id.is_assigned() {
            Value::Integer(game.id.get())
        } else {
            Value::Null
        };
        self.conn
            .execute(
                "INSERT INTO matches (id, external_id, status, team1_id, team2_id, scheduled_at,
                    game_number, game_pin, session_id, is_test, coin_toss, extra, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                vec![
                    id,
                    text_or_null(game.external_id.as_deref()),
                    Value::Text(game.status.as_str().to_string()),
                    int_or_null(game.team1_id),
                    int_or_null(game.team2_id),
                    text_or_null(game.scheduled_at.as_deref()),
                    int_or_null(game.game_number),
                    text_or_null(game.game_pin.as_deref()),
                    text_or_null(game.session_id.as_deref()),
                    flag(game.test),
                    Self::coin_toss_column(game)?,
                    map_column(&game.extra)?,
                    Value::Text(now.clone()),
                    Value::Text(now),
                ],
            )
            .await?;
        Ok(MatchId(self.conn.last_insert_rowid()))
    }

    async fn get(&self, id: MatchId) -> Result<Option<Match>> {
        self.query_one(
            &format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?"),
            vec![Value::Integer(id.get())],
        )
        .await
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Match>> {
        self.query_one(
            &format!("SELECT {MATCH_COLUMNS} FROM matches WHERE external_id = ?"),
            vec![Value::Text(external_id.to_string())],
        )
        .await
    }

    async fn update(&self, game: &Match) -> Result<()> {
        let affected = self
            .conn
            .execute(
                "UPDATE matches SET
                    external_id = COALESCE(external_id, ?),
                    status = ?, team1_id = ?, team2_id = ?, scheduled_at = ?,
                    game_number = ?, game_pin = ?, session_id = ?, is_test = ?,
                    coin_toss = ?, extra = ?, updated_at = ?
                 WHERE id = ?",
                vec![
                    text_or_null(game.external_id.as_deref()),
                    Value::Text(game.status.as_str().to_string()),
                    int_or_null(game.team1_id),
                    int_or_null(game.team2_id),
                    text_or_null(game.scheduled_at.as_deref()),
                    int_or_null(game.game_number),
                    text_or_null(game.game_pin.as_deref()),
                    text_or_null(game.session_id.as_deref()),
                    flag(game.test),
                    Self::coin_toss_column(game)?,
                    map_column(&game.extra)?,
                    Value::Text(iso_now()),
                    Value::Integer(game.id.get()),
                ],
            )
            .await?;
        if affected == 0 {
            return Err(Error::NotFound(format!("match {}", game.id)));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Match>> {
        let mut rows = self
            .conn
            .query(&format!("SELECT {MATCH_COLUMNS} FROM matches ORDER BY id"), ())
            .await?;
        let mut matches = Vec::new();
        while let Some(row) = rows.next().await? {
            matches.push(Self::parse_match(&row)?);
        }
        Ok(matches)
    }

    async fn set_session(&self, id: MatchId, session_id: Option<&str>) -> Result<bool> {
        let affected = self
            .conn
            .execute(
                "UPDATE matches SET session_id = ?, updated_at = ? WHERE id = ?",
                vec![
                    text_or_null(session_id),
                    Value::Text(iso_now()),
                    Value::Integer(id.get()),
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM matches", ()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn sample_match() -> Match {
        let mut game = Match {
            external_id: Some("ext-1".to_string()),
            game_number: Some(7),
            game_pin: Some("123456".to_string()),
            coin_toss: Some(CoinToss {
                confirmed: true,
                team_a: Some("home".to_string()),
                ..CoinToss::default()
            }),
            ..Match::default()
        };
        game.extra.insert("hall".to_string(), json!("Centre Court"));
        game
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_get() {
        let db = setup().await;
        let repo = LibSqlMatchRepository::new(db.connection());

        let id = repo.insert(&sample_match()).await.unwrap();
        let loaded = repo.get(id).await.unwrap().unwrap();

        assert_eq!(loaded.id, id);
        assert_eq!(loaded, Match { id, ..sample_match() });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_returns_none() {
        let db = setup().await;
        let repo = LibSqlMatchRepository::new(db.connection());
        assert!(repo.get(MatchId(99)).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_keeps_existing_external_id() {
        let db = setup().await;
        let repo = LibSqlMatchRepository::new(db.connection());
        let id = repo.insert(&sample_match()).await.unwrap();

        let changed = Match {
            id,
            external_id: Some("other".to_string()),
            status: MatchStatus::Finished,
            ..sample_match()
        };
        repo.update(&changed).await.unwrap();

        let loaded = repo.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.external_id.as_deref(), Some("ext-1"));
        assert_eq!(loaded.status, MatchStatus::Finished);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_missing_match_is_not_found() {
        let db = setup().await;
        let repo = LibSqlMatchRepository::new(db.connection());
        let result = repo.update(&Match { id: MatchId(5), ..Match::default() }).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_session_reports_missing_match() {
        let db = setup().await;
        let repo = LibSqlMatchRepository::new(db.connection());
        let id = repo.insert(&Match::default()).await.unwrap();

        assert!(repo.set_session(id, Some("a-b-c")).await.unwrap());
        assert_eq!(
            repo.get(id).await.unwrap().unwrap().session_id.as_deref(),
            Some("a-b-c")
        );
        assert!(repo.set_session(id, None).await.unwrap());
        assert!(repo.get(id).await.unwrap().unwrap().session_id.is_none());
        assert!(!repo.set_session(MatchId(42), Some("x")).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ids_restart_after_clear() {
        let db = setup().await;
        let repo = LibSqlMatchRepository::new(db.connection());
        repo.insert(&Match::default()).await.unwrap();
        repo.insert(&Match::default()).await.unwrap();

        repo.clear().await.unwrap();
        let id = repo.insert(&Match::default()).await.unwrap();
        assert_eq!(id, MatchId(1));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
