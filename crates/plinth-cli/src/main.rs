//! Plinth Command-Line Migration Runner
//!
//! Applies pending schema migrations for an admin plugin and reports
//! checkpoint state.

mod commands;
mod formatter;

use clap::{Parser, Subcommand};
use formatter::OutputFormat;
use plinth_core::{DatabaseConfig, LockConfig, MigrationConfig, SettingsConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Plinth Command-Line Migration Runner
#[derive(Parser, Debug)]
#[command(name = "plinth")]
#[command(version, about = "Plinth schema migration runner")]
pub struct Args {
    /// SQLite database the migrations are applied to
    #[arg(long, default_value = "./plinth.db", global = true)]
    pub database: PathBuf,

    /// Settings store directory holding migration checkpoints
    #[arg(long, default_value = "./plinth-settings", global = true)]
    pub settings: PathBuf,

    /// Directory containing NNN-description migration files
    #[arg(long, default_value = "./migrations", global = true)]
    pub migrations: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", value_enum, global = true)]
    pub format: OutputFormat,

    /// Commit migrations without an entry point as no-ops
    #[arg(long, global = true)]
    pub permissive: bool,

    /// Skip the cross-process run lease
    #[arg(long, global = true)]
    pub no_lock: bool,

    /// Run lease lifetime in seconds
    #[arg(long, default_value_t = plinth_core::config::DEFAULT_LOCK_TTL_SECS, global = true)]
    pub lock_ttl: u64,

    /// SQLite busy timeout in milliseconds
    #[arg(long, default_value_t = plinth_core::config::DEFAULT_BUSY_TIMEOUT_MS, global = true)]
    pub busy_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Runner subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending migrations in order, stopping at the first failure
    Run {
        /// List what would run without touching the database or checkpoints
        #[arg(long)]
        dry_run: bool,

        /// Stop after this migration id
        #[arg(long, value_name = "NNN")]
        to: Option<String>,
    },
    /// Show every discovered migration and whether it has been applied
    Status,
    /// List pending migration ids; exits with code 2 when any are pending
    Pending,
    /// Forget all recorded checkpoints
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

impl Args {
    /// Build the runner configuration from command-line flags.
    pub fn migration_config(&self) -> MigrationConfig {
        let mut config = MigrationConfig::new(&self.migrations);
        if self.permissive {
            config = config.permissive_entry_points();
        }
        if self.no_lock {
            config.without_lock()
        } else {
            config.with_lock(LockConfig::default().with_ttl(Duration::from_secs(self.lock_ttl)))
        }
    }

    /// Build the database configuration from command-line flags.
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.database)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }

    /// Build the settings store configuration from command-line flags.
    pub fn settings_config(&self) -> SettingsConfig {
        SettingsConfig::new(&self.settings)
    }
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plinth=info,plinth_core=info".into()),
        )
        .init();

    let args = Args::parse();

    match commands::dispatch(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
