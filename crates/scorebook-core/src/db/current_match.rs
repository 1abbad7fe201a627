//! Single-slot pointer to the match being scored on this device

use libsql::{Connection, Value};

use super::values;
use crate::error::Result;
use crate::models::MatchId;

/// Repository for the one "current match" slot.
///
/// The slot row cascades away when its match is deleted, so a wipe leaves it
/// empty.
pub struct CurrentMatchSlot<'a> {
    conn: &'a Connection,
}

impl<'a> CurrentMatchSlot<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Match currently occupying the slot
    pub async fn get(&self) -> Result<Option<MatchId>> {
        let mut rows = self
            .conn
            .query("SELECT match_id FROM current_match WHERE slot = 1", ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(values::opt_int(&row, 0)?.map(MatchId)),
            None => Ok(None),
        }
    }

    /// Point the slot at `id`, evicting any occupant
    pub async fn set(&self, id: MatchId) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO current_match (slot, match_id) VALUES (1, ?)",
                vec![Value::Integer(id.get())],
            )
            .await?;
        Ok(())
    }

    /// Occupy the slot only when it is empty; returns whether `id` took it
    pub async fn set_if_vacant(&self, id: MatchId) -> Result<bool> {
        let affected = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO current_match (slot, match_id) VALUES (1, ?)",
                vec![Value::Integer(id.get())],
            )
            .await?;
        Ok(affected > 0)
    }

    pub async fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM current_match", ()).await?;
        Ok(())
    }
}
