//! In-code registry of migrations.

use super::{MigrationSource, SourceError};
use crate::migration::Migration;
use std::collections::BTreeMap;

/// Registry of migrations compiled into the application.
///
/// Migrations are kept sorted by name, which is also their execution order.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedMigrationSource {
    migrations: BTreeMap<String, Migration>,
}

impl EmbeddedMigrationSource {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            migrations: BTreeMap::new(),
        }
    }

    /// Register a migration, replacing any earlier one with the same name.
    pub fn register(&mut self, name: impl Into<String>, migration: Migration) -> &mut Self {
        self.migrations.insert(name.into(), migration);
        self
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, migration: Migration) -> Self {
        self.register(name, migration);
        self
    }
}

impl MigrationSource for EmbeddedMigrationSource {
    fn get_migrations(&self) -> Result<BTreeMap<String, Migration>, SourceError> {
        Ok(self.migrations.clone())
    }
}
