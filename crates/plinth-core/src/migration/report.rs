//! Run reports.

use std::path::PathBuf;

use serde::Serialize;

use super::error::{FailureKind, UnitFailure};
use super::unit::{MigrationId, MigrationUnit};

/// A unit that ran, or would have run in a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutedEntry {
    /// The unit id.
    pub id: MigrationId,
    /// The source file name.
    pub source: String,
    /// True when the unit was only reported, not executed.
    pub dry_run: bool,
}

/// The unit that stopped the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    /// The unit id.
    pub id: MigrationId,
    /// Stable operator code, e.g. `migration_failed`.
    pub code: &'static str,
    /// Failure classification.
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
}

impl From<&UnitFailure> for ErrorEntry {
    fn from(failure: &UnitFailure) -> Self {
        Self {
            id: failure.id().clone(),
            code: failure.kind().code(),
            kind: failure.kind(),
            message: failure.to_string(),
        }
    }
}

/// Outcome of one runner invocation.
///
/// A run stops at its first failure, so `errors` holds at most one entry
/// and no unit after it appears anywhere in the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Units executed (or reported in a dry run), in order.
    pub executed: Vec<ExecutedEntry>,
    /// Units skipped because they had already completed.
    pub skipped: Vec<MigrationId>,
    /// The failure that halted the run, if any.
    pub errors: Vec<ErrorEntry>,
}

impl RunReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether the run finished without a failure.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check whether the run halted on a failure.
    pub fn halted(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Check whether nothing was executed, skipped or failed.
    pub fn is_empty(&self) -> bool {
        self.executed.is_empty() && self.skipped.is_empty() && self.errors.is_empty()
    }

    /// Ids of executed entries, in order.
    pub fn executed_ids(&self) -> Vec<&MigrationId> {
        self.executed.iter().map(|e| &e.id).collect()
    }

    /// The failure that halted the run.
    pub fn first_error(&self) -> Option<&ErrorEntry> {
        self.errors.first()
    }

    pub(crate) fn record_executed(&mut self, unit: &MigrationUnit, dry_run: bool) {
        self.executed.push(ExecutedEntry {
            id: unit.id.clone(),
            source: unit.source_label(),
            dry_run,
        });
    }

    pub(crate) fn record_skipped(&mut self, unit: &MigrationUnit) {
        self.skipped.push(unit.id.clone());
    }

    pub(crate) fn record_error(&mut self, failure: &UnitFailure) {
        self.errors.push(ErrorEntry::from(failure));
    }
}

/// Status of one catalog unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitStatus {
    /// The unit id.
    pub id: MigrationId,
    /// Description from the file name.
    pub description: String,
    /// Source file path.
    pub source: PathBuf,
    /// How the unit executes (`sql`, `code` or `unresolved`).
    pub body: &'static str,
    /// Whether the unit has completed.
    pub applied: bool,
}
