//! Shared service layer used by the CLI and background tasks.

mod database;

pub use database::DatabaseService;
