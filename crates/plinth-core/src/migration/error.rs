//! Migration-specific error types.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use super::unit::MigrationId;

/// Classification of a unit failure recorded in a run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The unit's source vanished between catalog scan and execution.
    NotFound,
    /// The unit body reported a handled failure.
    DomainFailure,
    /// The unit body raised a database error, an I/O error or panicked.
    UnexpectedFault,
    /// The unit has no entry point and strict mode is on.
    MissingEntryPoint,
    /// The unit committed but its checkpoint could not be written.
    Checkpoint,
}

impl FailureKind {
    /// Stable code for operators and log filters.
    ///
    /// Domain failures and faults share `migration_failed`; the kind tells
    /// them apart.
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "migration_not_found",
            FailureKind::DomainFailure | FailureKind::UnexpectedFault => "migration_failed",
            FailureKind::MissingEntryPoint => "migration_entry_point_missing",
            FailureKind::Checkpoint => "migration_checkpoint_failed",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned by a migration body.
#[derive(Debug, Error)]
pub enum UnitError {
    /// A handled, business-rule failure (e.g. a precondition is not met).
    #[error("{0}")]
    Domain(String),

    /// A statement failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Reading the unit source failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl UnitError {
    /// Create a domain failure.
    pub fn domain(message: impl Into<String>) -> Self {
        UnitError::Domain(message.into())
    }
}

/// Why a single migration unit did not complete.
#[derive(Debug, Error)]
pub enum UnitFailure {
    /// Source file is gone. No transaction was opened.
    #[error("migration {id} not found at {}", path.display())]
    NotFound {
        /// The unit id.
        id: MigrationId,
        /// The missing source path.
        path: PathBuf,
    },

    /// The body reported a domain failure. The transaction was rolled back.
    #[error("migration {id} failed: {message}")]
    DomainFailure {
        /// The unit id.
        id: MigrationId,
        /// The body's message.
        message: String,
    },

    /// The body faulted or the transaction could not be completed.
    #[error("migration {id} raised an unexpected fault: {message}")]
    UnexpectedFault {
        /// The unit id.
        id: MigrationId,
        /// The fault's message.
        message: String,
    },

    /// No body is registered for the unit and strict mode is on.
    #[error("migration {id} has no entry point")]
    MissingEntryPoint {
        /// The unit id.
        id: MigrationId,
    },

    /// The transaction committed but the checkpoint write failed.
    /// The unit will be attempted again on the next run.
    #[error("migration {id} committed but its checkpoint was not recorded: {message}")]
    Checkpoint {
        /// The unit id.
        id: MigrationId,
        /// The storage error message.
        message: String,
    },
}

impl UnitFailure {
    /// The id of the failed unit.
    pub fn id(&self) -> &MigrationId {
        match self {
            UnitFailure::NotFound { id, .. }
            | UnitFailure::DomainFailure { id, .. }
            | UnitFailure::UnexpectedFault { id, .. }
            | UnitFailure::MissingEntryPoint { id }
            | UnitFailure::Checkpoint { id, .. } => id,
        }
    }

    /// The failure classification.
    pub fn kind(&self) -> FailureKind {
        match self {
            UnitFailure::NotFound { .. } => FailureKind::NotFound,
            UnitFailure::DomainFailure { .. } => FailureKind::DomainFailure,
            UnitFailure::UnexpectedFault { .. } => FailureKind::UnexpectedFault,
            UnitFailure::MissingEntryPoint { .. } => FailureKind::MissingEntryPoint,
            UnitFailure::Checkpoint { .. } => FailureKind::Checkpoint,
        }
    }

    /// Build the failure matching a body error.
    pub(crate) fn from_unit_error(id: &MigrationId, error: UnitError) -> Self {
        match error {
            UnitError::Domain(message) => UnitFailure::DomainFailure {
                id: id.clone(),
                message,
            },
            other => UnitFailure::UnexpectedFault {
                id: id.clone(),
                message: other.to_string(),
            },
        }
    }
}

/// Run-level errors. These abort a runner operation instead of being
/// recorded in the report.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The migrations directory could not be listed.
    #[error("cannot read migration catalog at {}: {source}", path.display())]
    Catalog {
        /// The directory being scanned.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A string is not a valid three-digit migration id.
    #[error("invalid migration id {0:?}: expected exactly three digits")]
    InvalidId(String),

    /// The stored completed set could not be decoded.
    #[error("checkpoint state corrupted: {message}")]
    CheckpointCorrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Another runner holds the run lease.
    #[error("migration lease {name:?} is held by {owner} until {expires_at_ms}")]
    LockHeld {
        /// The lease name.
        name: String,
        /// The current holder.
        owner: String,
        /// Lease expiry, milliseconds since the Unix epoch.
        expires_at_ms: i64,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] crate::error::Error),
}
