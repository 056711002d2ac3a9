use crate::migration::DEFAULT_TABLE_NAME;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file looked up by the CLI.
pub const CONFIG_FILE: &str = "litemigrate.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

/// Migrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratorConfig {
    /// Name of the executed-migration log table.
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// Allow new migrations to sort before the last executed one.
    #[serde(default)]
    pub allow_unordered_migrations: bool,
    /// Directory scanned for `.sql` migration files.
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    /// SQLite database file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            allow_unordered_migrations: false,
            migrations_dir: default_migrations_dir(),
            database: None,
        }
    }
}

/// Read the configuration file, returning `None` if it doesn't exist
pub fn read_config(path: &Path) -> Result<Option<MigratorConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let config: MigratorConfig = serde_json::from_str(&content)?;
    Ok(Some(config))
}

/// Write the configuration file
pub fn write_config(path: &Path, config: &MigratorConfig) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_config(&dir.path().join(CONFIG_FILE)).unwrap().is_none());
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: MigratorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, MigratorConfig::default());
        assert_eq!(config.table_name, "migrations");
        assert!(!config.allow_unordered_migrations);
    }

    #[test]
    fn test_camel_case_fields() {
        let config: MigratorConfig = serde_json::from_str(
            r#"{"tableName": "schema_log", "allowUnorderedMigrations": true, "database": "app.db"}"#,
        )
        .unwrap();
        assert_eq!(config.table_name, "schema_log");
        assert!(config.allow_unordered_migrations);
        assert_eq!(config.database, Some(PathBuf::from("app.db")));
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = MigratorConfig {
            table_name: "schema_log".to_string(),
            ..Default::default()
        };

        write_config(&path, &config).unwrap();
        assert_eq!(read_config(&path).unwrap(), Some(config));
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "not json").unwrap();
        assert!(matches!(read_config(&path), Err(ConfigError::JsonError(_))));
    }
}
