//! Types for the migration system.

use crate::source::SourceError;
use chrono::{DateTime, Utc};
use rusqlite::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error type returned by migration operations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A single forward or backward change, run against the batch transaction.
pub type Operation = Arc<dyn Fn(&Transaction<'_>) -> Result<(), BoxError> + Send + Sync>;

/// Which consistency rule the executed log broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryViolation {
    /// The log references a migration the source no longer provides.
    MissingMigration,
    /// The log holds the same migration more than once.
    DuplicateEntry,
    /// A known migration sorts before one that already ran.
    OutOfOrder { expected: String },
}

/// Error types for migration operations.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration source error: {0}")]
    Source(#[from] SourceError),

    #[error("{}", corrupted_history_message(.name, .index, .violation))]
    CorruptedHistory {
        name: String,
        index: usize,
        violation: HistoryViolation,
    },

    #[error("Migration {name} failed while migrating {direction}: {source}")]
    MigrationFailed {
        name: String,
        direction: MigrationDirection,
        #[source]
        source: BoxError,
    },

    #[error("Migration {0} doesn't exist")]
    UnknownTarget(String),

    #[error("Invalid log table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid timestamp {value:?} recorded for migration {name}")]
    InvalidTimestamp { name: String, value: String },
}

fn corrupted_history_message(name: &str, index: &usize, violation: &HistoryViolation) -> String {
    match violation {
        HistoryViolation::MissingMigration => format!(
            "Corrupted migrations: previously executed migration {} (position {}) is missing",
            name, index
        ),
        HistoryViolation::DuplicateEntry => format!(
            "Corrupted migrations: migration {} is logged again at position {}",
            name, index
        ),
        HistoryViolation::OutOfOrder { expected } => format!(
            "Corrupted migrations: expected previously executed migration {} to be at position {} but {} was found in its place. \
             New migrations must always have a name that comes alphabetically after the last executed migration.",
            name, index, expected
        ),
    }
}

impl MigrationError {
    /// Whether this error came from a consistency check on the executed log.
    pub fn is_corrupted_history(&self) -> bool {
        matches!(self, MigrationError::CorruptedHistory { .. })
    }
}

/// A named schema change: a mandatory forward operation and an optional
/// backward one.
#[derive(Clone)]
pub struct Migration {
    up: Operation,
    down: Option<Operation>,
}

impl Migration {
    /// Create a forward-only migration from a closure.
    pub fn new<F>(up: F) -> Self
    where
        F: Fn(&Transaction<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            up: Arc::new(up),
            down: None,
        }
    }

    /// Attach a backward operation.
    pub fn with_down<F>(mut self, down: F) -> Self
    where
        F: Fn(&Transaction<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.down = Some(Arc::new(down));
        self
    }

    /// Forward-only migration that executes a batch of SQL statements.
    pub fn sql(up: impl Into<String>) -> Self {
        Self {
            up: sql_operation(up.into()),
            down: None,
        }
    }

    /// Migration whose forward and backward operations are SQL batches.
    pub fn sql_reversible(up: impl Into<String>, down: impl Into<String>) -> Self {
        Self {
            up: sql_operation(up.into()),
            down: Some(sql_operation(down.into())),
        }
    }

    pub fn up(&self) -> &Operation {
        &self.up
    }

    pub fn down(&self) -> Option<&Operation> {
        self.down.as_ref()
    }

    pub fn is_reversible(&self) -> bool {
        self.down.is_some()
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("reversible", &self.is_reversible())
            .finish()
    }
}

fn sql_operation(sql: String) -> Operation {
    Arc::new(move |tx: &Transaction<'_>| -> Result<(), BoxError> {
        tx.execute_batch(&sql)?;
        Ok(())
    })
}

/// A migration together with its name, as resolved from a source.
#[derive(Debug, Clone)]
pub struct NamedMigration {
    pub name: String,
    pub migration: Migration,
}

/// Direction of migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationDirection {
    /// Apply forward operations.
    Up,
    /// Apply backward operations.
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "Up"),
            MigrationDirection::Down => write!(f, "Down"),
        }
    }
}

/// Outcome of a single migration within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationStatus {
    Success,
    Error,
    NotExecuted,
}

/// Per-migration result of one orchestration call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub name: String,
    pub direction: MigrationDirection,
    pub status: MigrationStatus,
}

/// Result of an orchestration call.
///
/// Either `results` is present (possibly empty, possibly alongside an error
/// from a failed migration), or only `error` is set because no migration
/// state could be established.
#[derive(Debug)]
pub struct MigrationResultSet {
    /// Set when resolution failed or a migration in the batch failed.
    pub error: Option<MigrationError>,
    /// Ordered outcome per selected migration.
    pub results: Option<Vec<MigrationResult>>,
}

impl MigrationResultSet {
    pub(crate) fn empty() -> Self {
        Self {
            error: None,
            results: Some(Vec::new()),
        }
    }

    pub(crate) fn failed(error: MigrationError) -> Self {
        Self {
            error: Some(error),
            results: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The entry that failed, if any. Callers should report this first.
    pub fn failed_migration(&self) -> Option<&MigrationResult> {
        self.results
            .as_ref()
            .and_then(|results| results.iter().find(|r| r.status == MigrationStatus::Error))
    }

    /// Convert into a plain `Result`, dropping partial results on failure.
    pub fn into_result(self) -> Result<Vec<MigrationResult>, MigrationError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.results.unwrap_or_default()),
        }
    }
}

/// Introspection entry returned by `Migrator::get_migrations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationInfo {
    pub name: String,
    /// When the migration was executed, or `None` if it is pending.
    pub executed_at: Option<DateTime<Utc>>,
}

/// Target for `Migrator::migrate_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationTarget {
    /// Roll back every executed migration.
    NoMigrations,
    /// Migrate up or down until exactly this migration is the last executed.
    Named(String),
}
