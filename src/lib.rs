pub mod config;
pub mod migration;
pub mod source;

// Re-export commonly used types
pub use config::{read_config, write_config, ConfigError, MigratorConfig};
pub use migration::{
    BoxError, HistoryViolation, Migration, MigrationDirection, MigrationError, MigrationInfo,
    MigrationResult, MigrationResultSet, MigrationStatus, MigrationTarget, Migrator,
};
pub use source::{EmbeddedMigrationSource, FileMigrationSource, MigrationSource, SourceError};
