use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "scorebook")]
#[command(about = "Score matches offline and keep them backed up")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a match as a backup document
    Export {
        /// Match id (defaults to the current match)
        #[arg(long = "match", value_name = "ID")]
        match_id: Option<i64>,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Replace every local match with a backup document
    Restore {
        /// Backup document
        file: PathBuf,
    },
    /// Load a backup document into an existing match
    RestoreInPlace {
        /// Match to overwrite
        match_id: i64,
        /// Backup document
        file: PathBuf,
        /// Overwrite even when another device holds the match
        #[arg(long)]
        force: bool,
    },
    /// Import a match from the cloud by PIN
    Import {
        /// Match PIN
        #[arg(long)]
        pin: String,
        /// Game number, needed when the PIN is shared
        #[arg(long, value_name = "N")]
        game: Option<i64>,
    },
    /// Cloud backups
    Backups {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Device session and match locks
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Check a match PIN
    Pin {
        /// Match id
        match_id: i64,
        /// PIN to check
        pin: String,
    },
    /// Outbound cloud sync queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Record a scoring event and back the match up
    Event {
        /// Event type (point, timeout, substitution, ...)
        #[arg(value_name = "TYPE")]
        event_type: String,
        /// Match id (defaults to the current match)
        #[arg(long = "match", value_name = "ID")]
        match_id: Option<i64>,
        /// Set index
        #[arg(long, default_value = "1")]
        set: i64,
        /// JSON payload
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
        /// Explicit position, e.g. 3.5
        #[arg(long, value_name = "SEQ")]
        at: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// List backups of one game, newest first
    List {
        /// Game number
        game: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download one backup document
    Fetch {
        /// Object key as printed by `backups list`
        key: String,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Wipe-and-replace restore from a cloud backup
    Restore {
        /// Game number
        game: i64,
        /// Object key (defaults to the newest backup)
        #[arg(long)]
        key: Option<String>,
    },
    /// Upload a snapshot of a match now
    Upload {
        /// Match id (defaults to the current match)
        #[arg(long = "match", value_name = "ID")]
        match_id: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Print this device's session id
    Id,
    /// Forget this device's session id
    Reset,
    /// Show who holds a match
    Status {
        /// Match id (defaults to the current match)
        match_id: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Claim a match for this device
    Lock {
        /// Match id (defaults to the current match)
        match_id: Option<i64>,
    },
    /// Release a match
    Unlock {
        /// Match id (defaults to the current match)
        match_id: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List queued jobs
    List {
        /// Only jobs in this state
        #[arg(long, value_enum)]
        status: Option<QueueStatus>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Deliver queued restore jobs to the cloud
    Push,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum QueueStatus {
    Queued,
    Sent,
    Failed,
}
