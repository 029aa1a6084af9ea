//! Durable history for Beacon
//!
//! A libsql database holding every check result, the latest confirmed state
//! of each target and every dispatched alert. [`LibsqlHistory`] is the
//! engine's [`beacon::HistoryStore`] and also serves the dashboard queries.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod retention;
pub mod store;

pub use error::{HistoryError, Result};
pub use models::StoredState;
pub use pool::{LibsqlManager, LibsqlPool, open_pool};
pub use retention::{CleanupReport, RetentionCleanup, RetentionPolicy};
pub use store::LibsqlHistory;
