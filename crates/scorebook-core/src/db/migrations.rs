//! Schema versions for the device store

use libsql::Connection;

use super::transaction;
use crate::error::Result;

const CURRENT_VERSION: i32 = 1;

/// Bring the schema up to [`CURRENT_VERSION`]. Each step commits on its own.
pub async fn run(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        (),
    )
    .await?;

    let from = get_version(conn).await?;
    if from < 1 {
        transaction::begin(conn).await?;
        let applied = apply(conn, &V1).await;
        transaction::finish(conn, applied).await?;
        tracing::info!(version = 1, "Applied schema migration");
    }

    tracing::debug!(from, to = CURRENT_VERSION, "Schema is current");
    Ok(())
}

async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}

async fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    for statement in statements {
        conn.execute(statement, ()).await?;
    }
    Ok(())
}

/// Match store, outbox and device settings
const V1: [&str; 14] = [
    // Teams survive match wipes and are found again by exact name
    "CREATE TABLE IF NOT EXISTS teams (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        short_name TEXT,
        color TEXT,
        country TEXT,
        extra TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_teams_name ON teams(name)",
    "CREATE TABLE IF NOT EXISTS players (
        id INTEGER PRIMARY KEY,
        team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        number INTEGER,
        first_name TEXT,
        last_name TEXT,
        dob TEXT,
        is_captain INTEGER NOT NULL DEFAULT 0,
        extra TEXT NOT NULL DEFAULT '{}'
    )",
    "CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id)",
    // No AUTOINCREMENT: ids start again at 1 after a wipe
    "CREATE TABLE IF NOT EXISTS matches (
        id INTEGER PRIMARY KEY,
        external_id TEXT UNIQUE,
        status TEXT NOT NULL DEFAULT 'live',
        team1_id INTEGER REFERENCES teams(id) ON DELETE SET NULL,
        team2_id INTEGER REFERENCES teams(id) ON DELETE SET NULL,
        scheduled_at TEXT,
        game_number INTEGER,
        game_pin TEXT,
        session_id TEXT,
        is_test INTEGER NOT NULL DEFAULT 0,
        coin_toss TEXT,
        extra TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sets (
        id INTEGER PRIMARY KEY,
        match_id INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
        set_index INTEGER NOT NULL,
        team1_points INTEGER NOT NULL DEFAULT 0,
        team2_points INTEGER NOT NULL DEFAULT 0,
        finished INTEGER NOT NULL DEFAULT 0,
        start_time TEXT,
        end_time TEXT,
        external_id TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_sets_match ON sets(match_id, set_index)",
    // sequence holds a fixed-point value scaled by 1_000_000
    "CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY,
        match_id INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
        set_index INTEGER NOT NULL,
        sequence INTEGER NOT NULL,
        event_type TEXT NOT NULL,
        payload TEXT NOT NULL DEFAULT 'null',
        ts TEXT,
        external_id TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_events_order ON events(match_id, set_index, sequence)",
    "CREATE TABLE IF NOT EXISTS sync_queue (
        id INTEGER PRIMARY KEY,
        resource TEXT NOT NULL,
        action TEXT NOT NULL,
        payload TEXT NOT NULL,
        ts TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'queued'
    )",
    "CREATE INDEX IF NOT EXISTS idx_sync_queue_status ON sync_queue(status)",
    // Single-slot pointer to the match being scored on this device
    "CREATE TABLE IF NOT EXISTS current_match (
        slot INTEGER PRIMARY KEY CHECK (slot = 1),
        match_id INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE
    )",
    // Key/value pairs private to this device
    "CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
    "INSERT INTO schema_version (version) VALUES (1)",
];
