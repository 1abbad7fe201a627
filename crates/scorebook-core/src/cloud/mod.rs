//! Cloud row-store: row shapes, the consumer of queued restore jobs, and the
//! read side used by cloud import.

mod row_store;
mod rows;
mod supabase;

pub use row_store::{push_restore_jobs, CloudRowStore, MemoryRowStore, PushReport};
pub use rows::{
    filter_match_columns, CloudEventRow, CloudMatchBundle, CloudMatchRow, CloudSetRow,
    LiveStateRow, RestorePayload, MATCH_COLUMN_ALLOW_LIST,
};
pub use supabase::{SupabaseConfig, SupabaseRowStore};

/// Sport type written into cloud rows and used to scope lookups
pub const DEFAULT_SPORT_TYPE: &str = "beach";
