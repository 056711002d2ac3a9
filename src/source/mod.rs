//! Migration sources.
//!
//! A source hands the migrator every migration it knows about, keyed by
//! name. How it finds them is up to the implementation: the crate ships an
//! in-code registry and a directory scanner for `.sql` files.

mod embedded;
mod file;

pub use embedded::EmbeddedMigrationSource;
pub use file::FileMigrationSource;

use crate::migration::Migration;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to scan migrations directory: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Migrations directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Migration {0} is defined more than once")]
    DuplicateMigration(String),

    #[error("Migration {0} has a down file but no up file")]
    MissingUp(String),

    #[error("Invalid migration name: {0:?}")]
    InvalidName(String),
}

/// Provider of the full set of known migrations.
pub trait MigrationSource: Send + Sync {
    /// Return every migration keyed by its unique name.
    fn get_migrations(&self) -> Result<BTreeMap<String, Migration>, SourceError>;
}

impl<S: MigrationSource + ?Sized> MigrationSource for Box<S> {
    fn get_migrations(&self) -> Result<BTreeMap<String, Migration>, SourceError> {
        (**self).get_migrations()
    }
}

impl<S: MigrationSource + ?Sized> MigrationSource for std::sync::Arc<S> {
    fn get_migrations(&self) -> Result<BTreeMap<String, Migration>, SourceError> {
        (**self).get_migrations()
    }
}
