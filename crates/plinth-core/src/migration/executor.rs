//! Migration executor - runs one unit inside its own transaction.
//!
//! The checkpoint is written only after the transaction commits. The two
//! writes go to different stores and are not atomic with each other: a
//! crash between them leaves the schema change applied but unrecorded, and
//! the next run applies the unit again. Unit bodies therefore have to be
//! idempotent (`CREATE TABLE IF NOT EXISTS`, guarded data fixes, ...).

use std::panic::{catch_unwind, AssertUnwindSafe};

use rusqlite::Transaction;
use tracing::{debug, error, info};

use super::checkpoint::CheckpointStore;
use super::error::{UnitError, UnitFailure};
use super::unit::{MigrationUnit, UnitBody};
use crate::database::Database;
use crate::settings::SettingsStore;

/// What the body did inside the transaction.
enum BodyOutcome {
    Applied,
    NoEntryPoint,
}

/// Runs single migration units.
pub struct MigrationExecutor {
    strict_entry_points: bool,
}

impl MigrationExecutor {
    /// Create an executor.
    ///
    /// With `strict_entry_points` a unit without an entry point fails;
    /// otherwise it commits as a no-op.
    pub fn new(strict_entry_points: bool) -> Self {
        Self {
            strict_entry_points,
        }
    }

    /// Execute `unit` and record its checkpoint on success.
    pub fn execute<S: SettingsStore>(
        &self,
        unit: &MigrationUnit,
        db: &mut Database,
        checkpoints: &CheckpointStore<S>,
    ) -> Result<(), UnitFailure> {
        let id = &unit.id;

        if !unit.source_exists() {
            return Err(UnitFailure::NotFound {
                id: id.clone(),
                path: unit.source.clone(),
            });
        }

        let tx = db.begin().map_err(|e| UnitFailure::UnexpectedFault {
            id: id.clone(),
            message: format!("cannot open transaction: {e}"),
        })?;

        let outcome = match catch_unwind(AssertUnwindSafe(|| Self::run_body(unit, &tx))) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                let failure = UnitFailure::from_unit_error(id, e);
                Self::rollback(tx, &failure);
                return Err(failure);
            }
            Err(panic) => {
                let failure = UnitFailure::UnexpectedFault {
                    id: id.clone(),
                    message: panic_message(panic.as_ref()),
                };
                Self::rollback(tx, &failure);
                return Err(failure);
            }
        };

        if matches!(outcome, BodyOutcome::NoEntryPoint) {
            if self.strict_entry_points {
                let failure = UnitFailure::MissingEntryPoint { id: id.clone() };
                Self::rollback(tx, &failure);
                return Err(failure);
            }
            debug!(id = %id, "no entry point, committing as no-op");
        }

        tx.commit().map_err(|e| UnitFailure::UnexpectedFault {
            id: id.clone(),
            message: format!("commit failed: {e}"),
        })?;

        checkpoints
            .mark_completed(id)
            .map_err(|e| UnitFailure::Checkpoint {
                id: id.clone(),
                message: e.to_string(),
            })?;

        info!(id = %id, source = %unit.source_label(), "migration applied");
        Ok(())
    }

    fn run_body(unit: &MigrationUnit, tx: &Transaction<'_>) -> Result<BodyOutcome, UnitError> {
        match &unit.body {
            UnitBody::Sql => {
                let script = std::fs::read_to_string(&unit.source)?;
                if !has_statements(&script) {
                    return Ok(BodyOutcome::NoEntryPoint);
                }
                tx.execute_batch(&script)?;
                Ok(BodyOutcome::Applied)
            }
            UnitBody::Code(body) => {
                body.apply(tx)?;
                Ok(BodyOutcome::Applied)
            }
            UnitBody::Unresolved => Ok(BodyOutcome::NoEntryPoint),
        }
    }

    fn rollback(tx: Transaction<'_>, failure: &UnitFailure) {
        error!(id = %failure.id(), kind = %failure.kind(), error = %failure, "migration failed, rolling back");
        if let Err(e) = tx.rollback() {
            error!(id = %failure.id(), error = %e, "rollback failed");
        }
    }
}

impl Default for MigrationExecutor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Check whether a SQL script contains anything besides whitespace and comments.
fn has_statements(script: &str) -> bool {
    let mut rest = script;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return !rest.is_empty();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::error::FailureKind;
    use crate::migration::unit::{MigrationBody, MigrationId};
    use crate::settings::MemorySettings;
    use std::path::Path;
    use std::sync::Arc;

    fn id(s: &str) -> MigrationId {
        s.parse().unwrap()
    }

    fn sql_unit(dir: &Path, name: &str, sql: &str) -> MigrationUnit {
        let path = dir.join(name);
        std::fs::write(&path, sql).unwrap();
        let (id, _) = MigrationId::from_file_name(name).unwrap();
        MigrationUnit::new(id, path, name, UnitBody::Sql)
    }

    fn code_unit(dir: &Path, name: &str, body: Arc<dyn MigrationBody>) -> MigrationUnit {
        let path = dir.join(name);
        std::fs::write(&path, "").unwrap();
        let (id, _) = MigrationId::from_file_name(name).unwrap();
        MigrationUnit::new(id, path, name, UnitBody::Code(body))
    }

    #[test]
    fn test_has_statements() {
        assert!(!has_statements(""));
        assert!(!has_statements("  \n\t"));
        assert!(!has_statements("-- nothing here\n/* still nothing */\n;"));
        assert!(!has_statements("-- c\n;"));
        assert!(!has_statements("; -- c"));
        assert!(!has_statements(" ;\n; /* c */ ;"));
        assert!(has_statements("-- create\nCREATE TABLE t (id INTEGER);"));
    }

    #[test]
    fn test_sql_unit_commits_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let unit = sql_unit(dir.path(), "001-items.sql", "CREATE TABLE items (id INTEGER);");
        let mut db = Database::open_in_memory().unwrap();
        let checkpoints = CheckpointStore::new(MemorySettings::new());

        MigrationExecutor::default()
            .execute(&unit, &mut db, &checkpoints)
            .unwrap();

        assert!(db.table_exists("items").unwrap());
        assert!(checkpoints.is_completed(&id("001")).unwrap());
        assert_eq!(db.transactions_opened(), 1);
    }

    #[test]
    fn test_sql_error_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let unit = sql_unit(
            dir.path(),
            "001-broken.sql",
            "CREATE TABLE items (id INTEGER); INSERT INTO missing VALUES (1);",
        );
        let mut db = Database::open_in_memory().unwrap();
        let checkpoints = CheckpointStore::new(MemorySettings::new());

        let failure = MigrationExecutor::default()
            .execute(&unit, &mut db, &checkpoints)
            .unwrap_err();

        assert_eq!(failure.kind(), FailureKind::UnexpectedFault);
        assert!(!db.table_exists("items").unwrap());
        assert!(checkpoints.load_completed().unwrap().is_empty());
    }

    #[test]
    fn test_domain_failure_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let body: Arc<dyn MigrationBody> = Arc::new(|tx: &Transaction<'_>| -> Result<(), UnitError> {
            tx.execute_batch("CREATE TABLE items (id INTEGER)")?;
            Err(UnitError::domain("items already seeded"))
        });
        let unit = code_unit(dir.path(), "002-seed.rs", body);
        let mut db = Database::open_in_memory().unwrap();
        let checkpoints = CheckpointStore::new(MemorySettings::new());

        let failure = MigrationExecutor::default()
            .execute(&unit, &mut db, &checkpoints)
            .unwrap_err();

        assert_eq!(failure.kind(), FailureKind::DomainFailure);
        assert_eq!(failure.to_string(), "migration 002 failed: items already seeded");
        assert!(!db.table_exists("items").unwrap());
        assert!(!checkpoints.is_completed(&id("002")).unwrap());
    }

    #[test]
    fn test_panic_becomes_fault() {
        let dir = tempfile::tempdir().unwrap();
        let body: Arc<dyn MigrationBody> =
            Arc::new(|_: &Transaction<'_>| -> Result<(), UnitError> { panic!("boom") });
        let unit = code_unit(dir.path(), "003-panics.rs", body);
        let mut db = Database::open_in_memory().unwrap();
        let checkpoints = CheckpointStore::new(MemorySettings::new());

        let failure = MigrationExecutor::default()
            .execute(&unit, &mut db, &checkpoints)
            .unwrap_err();

        assert_eq!(failure.kind(), FailureKind::UnexpectedFault);
        assert!(failure.to_string().contains("boom"));
        assert!(!checkpoints.is_completed(&id("003")).unwrap());
    }

    #[test]
    fn test_missing_source_opens_no_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let unit = sql_unit(dir.path(), "001-items.sql", "CREATE TABLE items (id INTEGER);");
        std::fs::remove_file(&unit.source).unwrap();
        let mut db = Database::open_in_memory().unwrap();
        let checkpoints = CheckpointStore::new(MemorySettings::new());

        let failure = MigrationExecutor::default()
            .execute(&unit, &mut db, &checkpoints)
            .unwrap_err();

        assert_eq!(failure.kind(), FailureKind::NotFound);
        assert_eq!(db.transactions_opened(), 0);
    }

    #[test]
    fn test_missing_entry_point_strict_and_permissive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("004-hook.php");
        std::fs::write(&path, "").unwrap();
        let unit = MigrationUnit::new(id("004"), path, "hook", UnitBody::Unresolved);
        let mut db = Database::open_in_memory().unwrap();
        let checkpoints = CheckpointStore::new(MemorySettings::new());

        let failure = MigrationExecutor::new(true)
            .execute(&unit, &mut db, &checkpoints)
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::MissingEntryPoint);
        assert!(!checkpoints.is_completed(&id("004")).unwrap());

        MigrationExecutor::new(false)
            .execute(&unit, &mut db, &checkpoints)
            .unwrap();
        assert!(checkpoints.is_completed(&id("004")).unwrap());
    }

    #[test]
    fn test_empty_sql_script_has_no_entry_point() {
        let dir = tempfile::tempdir().unwrap();
        let unit = sql_unit(dir.path(), "005-empty.sql", "-- todo\n");
        let mut db = Database::open_in_memory().unwrap();
        let checkpoints = CheckpointStore::new(MemorySettings::new());

        let failure = MigrationExecutor::default()
            .execute(&unit, &mut db, &checkpoints)
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::MissingEntryPoint);
    }
}
