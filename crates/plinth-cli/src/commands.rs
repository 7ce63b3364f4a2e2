//! Subcommand handlers.

use crate::formatter::{create_formatter, Formatter};
use crate::{Args, Command};
use plinth_core::{
    Database, MigrationError, MigrationId, MigrationRunner, RunOptions, SettingsStore,
    SledSettings,
};
use thiserror::Error;

/// Exit code when `pending` finds migrations still to apply.
pub const EXIT_PENDING: i32 = 2;

/// Errors surfaced by the command-line runner.
#[derive(Debug, Error)]
pub enum CliError {
    /// Storage could not be opened.
    #[error(transparent)]
    Storage(#[from] plinth_core::Error),

    /// Runner-level failure.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Invalid command-line usage.
    #[error("{0}")]
    Usage(String),
}

/// Run the selected subcommand and return the process exit code.
pub fn dispatch(args: &Args) -> Result<i32, CliError> {
    let settings = SledSettings::open(&args.settings_config())?;
    let runner = MigrationRunner::new(args.migration_config(), settings);
    let formatter = create_formatter(args.format);

    match &args.command {
        Command::Run { dry_run, to } => {
            let options = run_options(*dry_run, to.as_deref())?;
            let mut db = Database::open(&args.database_config())?;
            run(&runner, &mut db, options, &*formatter)
        }
        Command::Status => {
            println!("{}", formatter.format_status(&runner.status()?));
            Ok(0)
        }
        Command::Pending => pending(&runner, &*formatter),
        Command::Reset { yes } => reset(&runner, *yes, &*formatter),
    }
}

fn run_options(dry_run: bool, to: Option<&str>) -> Result<RunOptions, CliError> {
    let mut options = if dry_run {
        RunOptions::dry_run()
    } else {
        RunOptions::default()
    };
    if let Some(target) = to {
        let target: MigrationId = target
            .parse()
            .map_err(|e: MigrationError| CliError::Usage(e.to_string()))?;
        options = options.up_to(target);
    }
    Ok(options)
}

/// Apply pending migrations. Exits 1 when the run halted on a failure.
pub fn run<S: SettingsStore>(
    runner: &MigrationRunner<S>,
    db: &mut Database,
    options: RunOptions,
    formatter: &dyn Formatter,
) -> Result<i32, CliError> {
    let report = runner.run(db, options)?;
    println!("{}", formatter.format_report(&report));

    if let Some(error) = report.first_error() {
        eprintln!("{}: {}", error.kind, error.message);
        return Ok(1);
    }
    Ok(0)
}

/// Print pending ids.
pub fn pending<S: SettingsStore>(
    runner: &MigrationRunner<S>,
    formatter: &dyn Formatter,
) -> Result<i32, CliError> {
    let pending = runner.pending_ids()?;
    println!("{}", formatter.format_pending(&pending));
    Ok(if pending.is_empty() { 0 } else { EXIT_PENDING })
}

/// Clear recorded checkpoints.
pub fn reset<S: SettingsStore>(
    runner: &MigrationRunner<S>,
    confirmed: bool,
    formatter: &dyn Formatter,
) -> Result<i32, CliError> {
    if !confirmed {
        return Err(CliError::Usage(
            "reset forgets every applied migration; pass --yes to confirm".to_string(),
        ));
    }
    runner.reset()?;
    println!("{}", formatter.format_message("Checkpoints cleared"));
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::JsonFormatter;
    use plinth_core::{MemorySettings, MigrationConfig};
    use std::fs;
    use tempfile::TempDir;

    fn runner(dir: &TempDir) -> MigrationRunner<MemorySettings> {
        MigrationRunner::new(
            MigrationConfig::new(dir.path()).without_lock(),
            MemorySettings::new(),
        )
    }

    #[test]
    fn test_run_options_target() {
        let options = run_options(true, Some("003")).unwrap();
        assert!(options.dry_run);
        assert_eq!(options.target.unwrap().as_str(), "003");
    }

    #[test]
    fn test_run_options_rejects_bad_target() {
        assert!(matches!(
            run_options(false, Some("3")),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_run_exit_codes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("001-create.sql"), "CREATE TABLE a (id INTEGER);").unwrap();
        let runner = runner(&dir);
        let mut db = Database::open_in_memory().unwrap();

        assert_eq!(
            run(&runner, &mut db, RunOptions::default(), &JsonFormatter).unwrap(),
            0
        );

        fs::write(dir.path().join("002-broken.sql"), "CREATE TABLE;").unwrap();
        assert_eq!(
            run(&runner, &mut db, RunOptions::default(), &JsonFormatter).unwrap(),
            1
        );
    }

    #[test]
    fn test_pending_exit_code() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir);
        assert_eq!(pending(&runner, &JsonFormatter).unwrap(), 0);

        fs::write(dir.path().join("001-create.sql"), "CREATE TABLE a (id INTEGER);").unwrap();
        assert_eq!(pending(&runner, &JsonFormatter).unwrap(), EXIT_PENDING);
    }

    #[test]
    fn test_reset_requires_confirmation() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir);
        assert!(matches!(
            reset(&runner, false, &JsonFormatter),
            Err(CliError::Usage(_))
        ));
        assert_eq!(reset(&runner, true, &JsonFormatter).unwrap(), 0);
    }
}
