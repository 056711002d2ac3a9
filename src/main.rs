use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use litemigrate::config::{read_config, CONFIG_FILE};
use litemigrate::{
    FileMigrationSource, MigrationDirection, MigrationResultSet, MigrationStatus,
    MigrationTarget, Migrator,
};
use rusqlite::Connection;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Litemigrate - apply SQL migrations to a SQLite database
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database file
    #[arg(short, long, env = "LITEMIGRATE_DATABASE")]
    database: Option<PathBuf>,

    /// Directory containing `.sql` migration files
    #[arg(short, long, env = "LITEMIGRATE_MIGRATIONS_DIR")]
    migrations_dir: Option<PathBuf>,

    /// Config file (JSON)
    #[arg(short, long, env = "LITEMIGRATE_CONFIG", default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Name of the migration log table
    #[arg(long, env = "LITEMIGRATE_TABLE")]
    table: Option<String>,

    /// Allow new migrations to sort before the last executed one
    #[arg(long)]
    allow_unordered: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply all pending migrations
    Latest,
    /// Apply pending migrations
    Up {
        /// Number of migrations to apply (all if omitted)
        #[arg(long)]
        steps: Option<usize>,
    },
    /// Roll back executed migrations, newest first
    Down {
        /// Number of migrations to roll back
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },
    /// Migrate up or down to a named migration
    To {
        /// Target migration name
        #[arg(required_unless_present = "none")]
        name: Option<String>,
        /// Roll back every migration
        #[arg(long, conflicts_with = "name")]
        none: bool,
    },
    /// List migrations and when they were executed
    Status,
}

fn main() -> ExitCode {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {e}");
    }

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when a migration batch reported an error.
fn run(args: Args) -> anyhow::Result<bool> {
    let mut config = read_config(&args.config)
        .with_context(|| format!("failed to read {}", args.config.display()))?
        .unwrap_or_default();

    if let Some(table) = args.table {
        config.table_name = table;
    }
    if let Some(dir) = args.migrations_dir {
        config.migrations_dir = dir;
    }
    if args.allow_unordered {
        config.allow_unordered_migrations = true;
    }
    if let Some(database) = args.database {
        config.database = Some(database);
    }

    let Some(database) = config.database.clone() else {
        bail!("no database given; pass --database or set it in {}", args.config.display());
    };

    info!(
        database = %database.display(),
        migrations = %config.migrations_dir.display(),
        "Opening database"
    );

    let conn = Connection::open(&database)
        .with_context(|| format!("failed to open {}", database.display()))?;
    let source = FileMigrationSource::new(&config.migrations_dir);
    let mut migrator = Migrator::with_config(conn, source, &config)?;

    let result = match args.command {
        Command::Latest => migrator.migrate_to_latest(),
        Command::Up { steps } => migrator.run(MigrationDirection::Up, steps),
        Command::Down { steps } => migrator.run(MigrationDirection::Down, Some(steps)),
        Command::To { name, none } => {
            let target = match name {
                Some(name) if !none => MigrationTarget::Named(name),
                _ => MigrationTarget::NoMigrations,
            };
            migrator.migrate_to(target)
        }
        Command::Status => {
            let migrations = migrator.get_migrations()?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&migrations)?);
            } else {
                for migration in &migrations {
                    match migration.executed_at {
                        Some(at) => println!("[x] {} ({})", migration.name, at.to_rfc3339()),
                        None => println!("[ ] {}", migration.name),
                    }
                }
            }
            return Ok(true);
        }
    };

    report(&result, args.json)?;
    Ok(result.is_success())
}

fn report(result: &MigrationResultSet, json: bool) -> anyhow::Result<()> {
    if json {
        let value = serde_json::json!({
            "results": result.results,
            "error": result.error.as_ref().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if let Some(failed) = result.failed_migration() {
        println!("failed: {} ({})", failed.name, failed.direction);
    }

    if let Some(results) = &result.results {
        if results.is_empty() {
            println!("No migrations to run");
        }
        for r in results {
            let marker = match r.status {
                MigrationStatus::Success => "ok",
                MigrationStatus::Error => "error",
                MigrationStatus::NotExecuted => "skipped",
            };
            println!("{:>7}  {} {}", marker, r.direction, r.name);
        }
    }

    if let Some(error) = &result.error {
        println!("error: {}", error);
    }

    Ok(())
}
