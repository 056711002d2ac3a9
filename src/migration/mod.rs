//! Migration orchestration for SQLite.
//!
//! # Overview
//!
//! - A [`MigrationSource`](crate::source::MigrationSource) provides every known
//!   migration keyed by name; name order is execution order
//! - Executed migrations are recorded in a log table (`migrations` by default)
//! - The [`Migrator`] diffs the two, checks that the log is consistent with the
//!   source, and applies the pending (or rolls back the executed) migrations
//! - A batch runs inside a single immediate transaction and stops at the first
//!   failure, rolling back everything it did
//!
//! # Usage
//!
//! ```no_run
//! use litemigrate::{EmbeddedMigrationSource, Migration, Migrator};
//! use rusqlite::Connection;
//!
//! let source = EmbeddedMigrationSource::new().with(
//!     "001_init",
//!     Migration::sql_reversible("CREATE TABLE users (id INTEGER PRIMARY KEY)", "DROP TABLE users"),
//! );
//! let mut migrator = Migrator::new(Connection::open("app.db").unwrap(), source);
//! let result = migrator.migrate_to_latest();
//! if let Some(error) = result.error {
//!     eprintln!("migration failed: {error}");
//! }
//! ```

mod executor;
mod log_table;
mod resolver;
mod types;

pub use executor::Migrator;
pub use log_table::{ExecutedEntry, DEFAULT_TABLE_NAME};
pub use resolver::{resolve_state, MigrationState};
pub use types::{
    BoxError, HistoryViolation, Migration, MigrationDirection, MigrationError, MigrationInfo,
    MigrationResult, MigrationResultSet, MigrationStatus, MigrationTarget, NamedMigration,
    Operation,
};
