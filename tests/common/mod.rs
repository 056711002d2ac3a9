#![allow(dead_code)]

use rusqlite::Connection;
use std::path::Path;
use tempfile::TempDir;

/// Create a temporary directory for a test database and migrations
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Open (or create) the test database inside `dir`
pub fn open_db(dir: &Path) -> Connection {
    Connection::open(dir.join("test.db")).expect("Failed to open database")
}

/// Write a migration file into `dir/migrations`
pub fn write_migration(dir: &Path, file_name: &str, sql: &str) {
    let migrations = dir.join("migrations");
    std::fs::create_dir_all(&migrations).expect("Failed to create migrations dir");
    std::fs::write(migrations.join(file_name), sql).expect("Failed to write migration");
}

/// Names in the log table, ordered the way the migrator reads them
pub fn logged_names(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("SELECT name FROM \"{table}\" ORDER BY timestamp, name"))
        .expect("Failed to query log table");
    let names = stmt
        .query_map([], |row| row.get(0))
        .expect("Failed to read log table")
        .collect::<Result<Vec<String>, _>>()
        .expect("Failed to read log row");
    names
}

pub fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .expect("Failed to query sqlite_master")
        > 0
}
