//! Directory scanner for SQL migration files.
//!
//! Recognised file names:
//! - `<name>.up.sql`: forward operation
//! - `<name>.down.sql`: backward operation
//! - `<name>.sql`: forward operation with no backward counterpart
//!
//! Anything else in the directory is ignored.

use super::{MigrationSource, SourceError};
use crate::migration::Migration;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

static FILE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.+?)(?:\.(?P<direction>up|down))?\.sql$")
        .expect("migration file pattern should compile")
});

#[derive(Default)]
struct SqlPair {
    up: Option<String>,
    down: Option<String>,
}

/// Loads migrations from `.sql` files in a single directory.
#[derive(Debug, Clone)]
pub struct FileMigrationSource {
    dir: PathBuf,
}

impl FileMigrationSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn scan(&self) -> Result<BTreeMap<String, SqlPair>, SourceError> {
        if !self.dir.is_dir() {
            return Err(SourceError::DirectoryNotFound(self.dir.clone()));
        }

        let mut pairs: BTreeMap<String, SqlPair> = BTreeMap::new();

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            let Some(captures) = FILE_NAME_PATTERN.captures(&file_name) else {
                debug!(file = %file_name, "Skipping non-migration file");
                continue;
            };

            let name = captures["name"].to_string();
            if name.trim().is_empty() {
                return Err(SourceError::InvalidName(file_name.to_string()));
            }

            let sql = fs::read_to_string(entry.path())?;
            let pair = pairs.entry(name.clone()).or_default();
            let slot = match captures.name("direction").map(|m| m.as_str()) {
                Some("down") => &mut pair.down,
                _ => &mut pair.up,
            };

            if slot.is_some() {
                return Err(SourceError::DuplicateMigration(name));
            }
            *slot = Some(sql);
        }

        Ok(pairs)
    }
}

impl MigrationSource for FileMigrationSource {
    fn get_migrations(&self) -> Result<BTreeMap<String, Migration>, SourceError> {
        let mut migrations = BTreeMap::new();

        for (name, pair) in self.scan()? {
            let migration = match (pair.up, pair.down) {
                (Some(up), Some(down)) => Migration::sql_reversible(up, down),
                (Some(up), None) => Migration::sql(up),
                (None, _) => return Err(SourceError::MissingUp(name)),
            };
            migrations.insert(name, migration);
        }

        debug!(dir = %self.dir.display(), count = migrations.len(), "Loaded migration files");
        Ok(migrations)
    }
}
