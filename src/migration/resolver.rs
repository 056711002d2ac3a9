//! Derives migration state from a source and the executed log.

use super::log_table::{executed_entries, ExecutedEntry};
use super::types::{HistoryViolation, MigrationError, NamedMigration};
use crate::source::MigrationSource;
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::{debug, error};

/// Snapshot of known and executed migrations for a single call.
///
/// Rebuilt on every orchestration call and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct MigrationState {
    migrations: Vec<NamedMigration>,
    executed: Vec<ExecutedEntry>,
    pending: Vec<NamedMigration>,
}

impl MigrationState {
    /// All known migrations, ascending by name.
    pub fn migrations(&self) -> &[NamedMigration] {
        &self.migrations
    }

    /// Executed entries ordered by `(timestamp, name)`.
    pub fn executed(&self) -> &[ExecutedEntry] {
        &self.executed
    }

    pub fn executed_names(&self) -> impl Iterator<Item = &str> {
        self.executed.iter().map(|e| e.name.as_str())
    }

    /// Known migrations absent from the log, in name order.
    pub fn pending_migrations(&self) -> &[NamedMigration] {
        &self.pending
    }

    /// Name of the most recently executed migration.
    pub fn last_migration(&self) -> Option<&str> {
        self.executed.last().map(|e| e.name.as_str())
    }

    pub fn find(&self, name: &str) -> Option<&NamedMigration> {
        self.migrations
            .binary_search_by(|m| m.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.migrations[i])
    }
}

/// Load migrations and the executed log, check the log for consistency and
/// compute the pending set.
pub fn resolve_state<S: MigrationSource + ?Sized>(
    conn: &Connection,
    source: &S,
    table: &str,
    allow_unordered: bool,
) -> Result<MigrationState, MigrationError> {
    let migrations: Vec<NamedMigration> = source
        .get_migrations()?
        .into_iter()
        .map(|(name, migration)| NamedMigration { name, migration })
        .collect();
    let executed = executed_entries(conn, table)?;

    validate_history(&migrations, &executed, allow_unordered)?;

    let executed_set: HashSet<&str> = executed.iter().map(|e| e.name.as_str()).collect();
    let pending: Vec<NamedMigration> = migrations
        .iter()
        .filter(|m| !executed_set.contains(m.name.as_str()))
        .cloned()
        .collect();

    debug!(
        known = migrations.len(),
        executed = executed.len(),
        pending = pending.len(),
        "Resolved migration state"
    );

    Ok(MigrationState {
        migrations,
        executed,
        pending,
    })
}

/// `migrations` must already be sorted by name.
fn validate_history(
    migrations: &[NamedMigration],
    executed: &[ExecutedEntry],
    allow_unordered: bool,
) -> Result<(), MigrationError> {
    let known: HashSet<&str> = migrations.iter().map(|m| m.name.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(executed.len());

    for (index, entry) in executed.iter().enumerate() {
        if !seen.insert(entry.name.as_str()) {
            error!(migration = %entry.name, index, "Migration is logged more than once");
            return Err(MigrationError::CorruptedHistory {
                name: entry.name.clone(),
                index,
                violation: HistoryViolation::DuplicateEntry,
            });
        }
        if !known.contains(entry.name.as_str()) {
            error!(migration = %entry.name, index, "Executed migration is missing from source");
            return Err(MigrationError::CorruptedHistory {
                name: entry.name.clone(),
                index,
                violation: HistoryViolation::MissingMigration,
            });
        }
    }

    if allow_unordered {
        return Ok(());
    }

    // Every executed name is distinct and known here, so the log is never
    // longer than the source.
    for (index, (entry, migration)) in executed.iter().zip(migrations).enumerate() {
        let found = &migration.name;
        if found != &entry.name {
            error!(
                migration = %entry.name,
                found = %found,
                index,
                "Migration history is out of order"
            );
            return Err(MigrationError::CorruptedHistory {
                name: entry.name.clone(),
                index,
                violation: HistoryViolation::OutOfOrder {
                    expected: found.clone(),
                },
            });
        }
    }

    Ok(())
}
