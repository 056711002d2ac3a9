//! Executed-migration log table.
//!
//! One row per executed migration: `name` (primary key) and the RFC 3339
//! `timestamp` at which it ran.

use super::types::MigrationError;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};

/// Default name of the log table.
pub const DEFAULT_TABLE_NAME: &str = "migrations";

static TABLE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("table name pattern should compile")
});

/// A row of the log table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedEntry {
    pub name: String,
    pub timestamp: String,
}

impl ExecutedEntry {
    pub fn executed_at(&self) -> Result<DateTime<Utc>, MigrationError> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| MigrationError::InvalidTimestamp {
                name: self.name.clone(),
                value: self.timestamp.clone(),
            })
    }
}

/// The table name is interpolated into SQL, so it must be a plain identifier.
pub fn validate_table_name(name: &str) -> Result<(), MigrationError> {
    if TABLE_NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(MigrationError::InvalidTableName(name.to_string()))
    }
}

/// Current time in the format stored in the log.
///
/// Fixed width with a `Z` suffix so that text order is chronological order.
pub fn log_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Create the log table if it doesn't exist.
pub fn ensure_log_table(conn: &Connection, table: &str) -> Result<(), MigrationError> {
    validate_table_name(table)?;
    conn.execute_batch(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{table}" (
            name TEXT NOT NULL PRIMARY KEY,
            timestamp TEXT NOT NULL
        )"#
    ))?;
    Ok(())
}

pub fn log_table_exists(conn: &Connection, table: &str) -> Result<bool, MigrationError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// All executed migrations ordered by `(timestamp, name)`.
///
/// Returns an empty list when the table has not been created yet.
pub fn executed_entries(conn: &Connection, table: &str) -> Result<Vec<ExecutedEntry>, MigrationError> {
    validate_table_name(table)?;
    if !log_table_exists(conn, table)? {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(&format!(
        r#"SELECT name, timestamp FROM "{table}" ORDER BY timestamp, name"#
    ))?;
    let entries = stmt
        .query_map([], |row| {
            Ok(ExecutedEntry {
                name: row.get(0)?,
                timestamp: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn record_executed(
    conn: &Connection,
    table: &str,
    name: &str,
    timestamp: &str,
) -> Result<(), MigrationError> {
    conn.execute(
        &format!(r#"INSERT INTO "{table}" (name, timestamp) VALUES (?1, ?2)"#),
        params![name, timestamp],
    )?;
    Ok(())
}

pub fn remove_executed(conn: &Connection, table: &str, name: &str) -> Result<(), MigrationError> {
    conn.execute(
        &format!(r#"DELETE FROM "{table}" WHERE name = ?1"#),
        params![name],
    )?;
    Ok(())
}
