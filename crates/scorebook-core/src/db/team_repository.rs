//! Team and player repository

use libsql::{Connection, Row, Value};

use super::values::{self, flag, int_or_null, map_column, text_or_null};
use crate::error::Result;
use crate::models::{Player, Team};
use crate::util::iso_now;

const TEAM_COLUMNS: &str = "id, name, short_name, color, country, extra";
const PLAYER_COLUMNS: &str = "id, team_id, number, first_name, last_name, dob, is_captain, extra";

/// Teams and their rosters
pub struct LibSqlTeamRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlTeamRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_team(row: &Row) -> Result<Team> {
        Ok(Team {
            id: values::int(row, 0)?,
            name: values::text(row, 1)?,
            short_name: values::opt_text(row, 2)?,
            color: values::opt_text(row, 3)?,
            country: values::opt_text(row, 4)?,
            extra: values::json_map(row, 5)?,
        })
    }

    fn parse_player(row: &Row) -> Result<Player> {
        Ok(Player {
            id: values::int(row, 0)?,
            team_id: values::int(row, 1)?,
            number: values::opt_int(row, 2)?,
            first_name: values::opt_text(row, 3)?,
            last_name: values::opt_text(row, 4)?,
            dob: values::opt_text(row, 5)?,
            is_captain: values::boolean(row, 6)?,
            extra: values::json_map(row, 7)?,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<Team>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?"),
                vec![Value::Integer(id)],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_team(&row)?)),
            None => Ok(None),
        }
    }

    /// First team with exactly this name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Team>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE name = ? ORDER BY id LIMIT 1"),
                vec![Value::Text(name.to_string())],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_team(&row)?)),
            None => Ok(None),
        }
    }

    /// Always creates a new row; returns its id
    pub async fn insert(&self, team: &Team) -> Result<i64> {
        let now = iso_now();
        self.conn
            .execute(
                "INSERT INTO teams (name, short_name, color, country, extra, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                vec![
                    Value::Text(team.name.clone()),
                    text_or_null(team.short_name.as_deref()),
                    text_or_null(team.color.as_deref()),
                    text_or_null(team.country.as_deref()),
                    map_column(&team.extra)?,
                    Value::Text(now.clone()),
                    Value::Text(now),
                ],
            )
            .await?;
        Ok(self.conn.last_insert_rowid())
    }

    async fn update(&self, id: i64, team: &Team) -> Result<()> {
        self.conn
            .execute(
                "UPDATE teams SET name = ?, short_name = ?, color = ?, country = ?, extra = ?,
                    updated_at = ?
                 WHERE id = ?",
                vec![
                    Value::Text(team.name.clone()),
                    text_or_null(team.short_name.as_deref()),
                    text_or_null(team.color.as_deref()),
                    text_or_null(team.country.as_deref()),
                    map_column(&team.extra)?,
                    Value::Text(iso_now()),
                    Value::Integer(id),
                ],
            )
            .await?;
        Ok(())
    }

    /// Update the team with the same exact name, or create it
    pub async fn upsert_by_name(&self, team: &Team) -> Result<i64> {
        if let Some(existing) = self.find_by_name(&team.name).await? {
            self.update(existing.id, team).await?;
            return Ok(existing.id);
        }
        self.insert(team).await
    }

    pub async fn list_players(&self, team_id: i64) -> Result<Vec<Player>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE team_id = ? ORDER BY id"),
                vec![Value::Integer(team_id)],
            )
            .await?;
        let mut players = Vec::new();
        while let Some(row) = rows.next().await? {
            players.push(Self::parse_player(&row)?);
        }
        Ok(players)
    }

    pub async fn insert_player(&self, team_id: i64, player: &Player) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO players (team_id, number, first_name, last_name, dob, is_captain, extra)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                vec![
                    Value::Integer(team_id),
                    int_or_null(player.number),
                    text_or_null(player.first_name.as_deref()),
                    text_or_null(player.last_name.as_deref()),
                    text_or_null(player.dob.as_deref()),
                    flag(player.is_captain),
                    map_column(&player.extra)?,
                ],
            )
            .await?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Delete the team's roster and recreate it from `players`
    pub async fn replace_players(&self, team_id: i64, players: &[Player]) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM players WHERE team_id = ?",
                vec![Value::Integer(team_id)],
            )
            .await?;
        for player in players {
            self.insert_player(team_id, player).await?;
        }
        Ok(players.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn player(number: i64, last: &str) -> Player {
        Player {
            number: Some(number),
            last_name: Some(last.to_string()),
            ..Player::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_reuses_team_by_exact_name() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlTeamRepository::new(db.connection());

        let first = repo.upsert_by_name(&Team::new("Sharks")).await.unwrap();
        let renamed_color = Team {
            color: Some("#0044ff".to_string()),
            ..Team::new("Sharks")
        };
        let second = repo.upsert_by_name(&renamed_color).await.unwrap();
        let other = repo.upsert_by_name(&Team::new("sharks")).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        let stored = repo.get(first).await.unwrap().unwrap();
        assert_eq!(stored.color.as_deref(), Some("#0044ff"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replace_players_recreates_roster() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlTeamRepository::new(db.connection());
        let team_id = repo.insert(&Team::new("Sharks")).await.unwrap();

        repo.replace_players(team_id, &[player(1, "Rossi"), player(2, "Bianchi")])
            .await
            .unwrap();
        repo.replace_players(team_id, &[player(9, "Verdi")])
            .await
            .unwrap();

        let roster = repo.list_players(team_id).await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].number, Some(9));
        assert_eq!(roster[0].team_id, team_id);
    }
}
