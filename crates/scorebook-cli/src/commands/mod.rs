pub mod backups;
pub mod common;
pub mod event;
pub mod export;
pub mod queue;
pub mod restore;
pub mod session;
