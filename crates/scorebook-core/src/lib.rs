//! scorebook-core - Core library for Scorebook
//!
//! Offline-first match scoring store: the local database, the backup
//! document codec, backup and restore, cloud import, session locks and the
//! continuous backup scheduler. The CLI is a thin shell over this crate.

pub mod backup;
pub mod cloud;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod util;

pub use error::{Error, FailureCategory, Result};
pub use models::{Match, MatchId};
