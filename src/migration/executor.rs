//! Migration runner.

use super::log_table::{
    ensure_log_table, executed_entries, log_timestamp, record_executed, remove_executed,
    validate_table_name, DEFAULT_TABLE_NAME,
};
use super::resolver::{resolve_state, MigrationState};
use super::types::{
    MigrationDirection, MigrationError, MigrationInfo, MigrationResult, MigrationResultSet,
    MigrationStatus, MigrationTarget, NamedMigration,
};
use crate::config::MigratorConfig;
use crate::source::MigrationSource;
use chrono::Utc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::HashMap;
use tracing::{error, info, warn};

/// Runs migrations from a source against a SQLite connection.
///
/// Every call re-resolves state from scratch and executes its whole batch
/// inside one `BEGIN IMMEDIATE` transaction: either every selected migration
/// commits, or none does.
pub struct Migrator<S> {
    conn: Connection,
    source: S,
    table_name: String,
    allow_unordered: bool,
}

impl<S: MigrationSource> Migrator<S> {
    /// Create a migrator with the default log table and ordered migrations.
    pub fn new(conn: Connection, source: S) -> Self {
        Self {
            conn,
            source,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            allow_unordered: false,
        }
    }

    /// Create a migrator using the log table and ordering settings from `config`.
    pub fn with_config(
        conn: Connection,
        source: S,
        config: &MigratorConfig,
    ) -> Result<Self, MigrationError> {
        Ok(Self::new(conn, source)
            .with_table_name(config.table_name.clone())?
            .allow_unordered_migrations(config.allow_unordered_migrations))
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Result<Self, MigrationError> {
        let table_name = table_name.into();
        validate_table_name(&table_name)?;
        self.table_name = table_name;
        Ok(self)
    }

    /// Allow new migrations to sort before the last executed one.
    pub fn allow_unordered_migrations(mut self, allow: bool) -> Self {
        self.allow_unordered = allow;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Apply every pending migration.
    pub fn migrate_to_latest(&mut self) -> MigrationResultSet {
        self.run(MigrationDirection::Up, None)
    }

    /// Apply the next pending migration.
    pub fn migrate_up(&mut self) -> MigrationResultSet {
        self.run(MigrationDirection::Up, Some(1))
    }

    /// Roll back the most recently executed migration.
    pub fn migrate_down(&mut self) -> MigrationResultSet {
        self.run(MigrationDirection::Down, Some(1))
    }

    /// Migrate up or down until `target` is the last executed migration.
    ///
    /// [`MigrationTarget::NoMigrations`] rolls back everything.
    pub fn migrate_to(&mut self, target: MigrationTarget) -> MigrationResultSet {
        self.execute(move |state| plan_target(state, &target))
    }

    /// Run up to `steps` migrations in `direction`; `None` means no limit.
    pub fn run(&mut self, direction: MigrationDirection, steps: Option<usize>) -> MigrationResultSet {
        self.execute(move |_| Ok((direction, steps)))
    }

    /// All known migrations in name order, with their execution time if they ran.
    pub fn get_migrations(&self) -> Result<Vec<MigrationInfo>, MigrationError> {
        let migrations = self.source.get_migrations()?;
        let executed = executed_entries(&self.conn, &self.table_name)?;
        let executed: HashMap<&str, _> = executed.iter().map(|e| (e.name.as_str(), e)).collect();

        migrations
            .into_keys()
            .map(|name| -> Result<MigrationInfo, MigrationError> {
                let executed_at = executed
                    .get(name.as_str())
                    .map(|entry| entry.executed_at())
                    .transpose()?;
                Ok(MigrationInfo { name, executed_at })
            })
            .collect()
    }

    fn execute<F>(&mut self, plan: F) -> MigrationResultSet
    where
        F: FnOnce(&MigrationState) -> Result<(MigrationDirection, Option<usize>), MigrationError>,
    {
        if let Err(e) = ensure_log_table(&self.conn, &self.table_name) {
            error!(table = %self.table_name, error = %e, "Failed to create migration log table");
            return MigrationResultSet::failed(e);
        }

        let tx = match self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
        {
            Ok(tx) => tx,
            Err(e) => {
                error!(error = %e, "Failed to begin migration transaction");
                return MigrationResultSet::failed(e.into());
            }
        };

        let state = match resolve_state(&tx, &self.source, &self.table_name, self.allow_unordered)
        {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "Failed to resolve migration state");
                return MigrationResultSet::failed(e);
            }
        };

        let (direction, steps) = match plan(&state) {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, "Failed to plan migration");
                return MigrationResultSet::failed(e);
            }
        };

        let candidates = select_candidates(&state, direction, steps);
        if candidates.is_empty() {
            info!(%direction, "No migrations needed");
            return MigrationResultSet::empty();
        }

        info!(
            %direction,
            count = candidates.len(),
            "Starting migration"
        );

        let mut results: Vec<MigrationResult> = candidates
            .iter()
            .map(|m| MigrationResult {
                name: m.name.clone(),
                direction,
                status: MigrationStatus::NotExecuted,
            })
            .collect();

        if let Err(e) = apply_batch(&tx, &self.table_name, direction, &candidates, &mut results) {
            if let Err(rollback_err) = tx.rollback() {
                error!(error = %rollback_err, "Rollback failed");
            }
            return MigrationResultSet {
                error: Some(e),
                results: Some(results),
            };
        }

        if let Err(e) = tx.commit() {
            error!(error = %e, "Failed to commit migration transaction");
            return MigrationResultSet::failed(e.into());
        }

        info!(
            %direction,
            count = results
                .iter()
                .filter(|r| r.status == MigrationStatus::Success)
                .count(),
            "Migration completed successfully"
        );

        MigrationResultSet {
            error: None,
            results: Some(results),
        }
    }
}

/// Direction and step count needed to make `target` the last executed migration.
fn plan_target(
    state: &MigrationState,
    target: &MigrationTarget,
) -> Result<(MigrationDirection, Option<usize>), MigrationError> {
    let name = match target {
        MigrationTarget::NoMigrations => return Ok((MigrationDirection::Down, None)),
        MigrationTarget::Named(name) => name,
    };

    if state.find(name).is_none() {
        return Err(MigrationError::UnknownTarget(name.clone()));
    }

    let executed = state.executed();
    if let Some(index) = executed.iter().position(|e| &e.name == name) {
        return Ok((MigrationDirection::Down, Some(executed.len() - index - 1)));
    }

    // Known and not executed, so it must be pending.
    let index = state
        .pending_migrations()
        .iter()
        .position(|m| &m.name == name)
        .ok_or_else(|| MigrationError::UnknownTarget(name.clone()))?;
    Ok((MigrationDirection::Up, Some(index + 1)))
}

fn select_candidates(
    state: &MigrationState,
    direction: MigrationDirection,
    steps: Option<usize>,
) -> Vec<NamedMigration> {
    let limit = steps.unwrap_or(usize::MAX);

    match direction {
        MigrationDirection::Up => state
            .pending_migrations()
            .iter()
            .take(limit)
            .cloned()
            .collect(),
        MigrationDirection::Down => state
            .executed()
            .iter()
            .rev()
            .take(limit)
            .filter_map(|entry| state.find(&entry.name).cloned())
            .collect(),
    }
}

/// Execute `candidates` in order, stopping at the first failure.
///
/// `results` is updated in place so the caller keeps the partial outcome.
fn apply_batch(
    tx: &Transaction<'_>,
    table: &str,
    direction: MigrationDirection,
    candidates: &[NamedMigration],
    results: &mut [MigrationResult],
) -> Result<(), MigrationError> {
    for (candidate, result) in candidates.iter().zip(results.iter_mut()) {
        let name = &candidate.name;

        let operation = match direction {
            MigrationDirection::Up => candidate.migration.up(),
            MigrationDirection::Down => match candidate.migration.down() {
                Some(down) => down,
                None => {
                    warn!(migration = %name, "Skipping migration without a down operation");
                    continue;
                }
            },
        };

        info!(migration = %name, %direction, "Applying migration");

        let outcome = operation(tx)
            .map_err(|source| MigrationError::MigrationFailed {
                name: name.clone(),
                direction,
                source,
            })
            .and_then(|()| match direction {
                MigrationDirection::Up => {
                    record_executed(tx, table, name, &log_timestamp(Utc::now()))
                }
                MigrationDirection::Down => remove_executed(tx, table, name),
            });

        if let Err(e) = outcome {
            error!(migration = %name, error = %e, "Migration failed");
            result.status = MigrationStatus::Error;
            return Err(e);
        }

        result.status = MigrationStatus::Success;
    }

    Ok(())
}
