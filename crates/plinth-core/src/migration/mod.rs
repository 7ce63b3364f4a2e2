//! Versioned migration runner.
//!
//! This module applies numbered schema changes exactly in order:
//! - Catalog discovery from `NNN-description` files
//! - Durable checkpoints of completed units
//! - One transaction per unit, rolled back on failure
//! - Fail-fast runs: the first failure halts the run
//! - A cross-process lease so two runners never apply units concurrently
//!
//! # Failure kinds
//!
//! | Kind | Cause | Transaction |
//! |------|-------|-------------|
//! | `NotFound` | Source vanished after the scan | never opened |
//! | `DomainFailure` | Body returned [`UnitError::Domain`] | rolled back |
//! | `UnexpectedFault` | Database/I/O error or panic in the body | rolled back |
//! | `MissingEntryPoint` | No body for the unit (strict mode) | rolled back |
//! | `Checkpoint` | Checkpoint write failed after commit | committed |
//!
//! # Example
//!
//! ```ignore
//! use plinth_core::{Database, MigrationConfig, MigrationRunner, RunOptions, SledSettings};
//!
//! let settings = SledSettings::open(&SettingsConfig::new("./settings"))?;
//! let runner = MigrationRunner::new(MigrationConfig::new("./migrations"), settings);
//! let mut db = Database::open(&DatabaseConfig::new("./app.db"))?;
//!
//! let report = runner.run(&mut db, RunOptions::default())?;
//! if let Some(error) = report.first_error() {
//!     eprintln!("{}: {}", error.kind, error.message);
//! }
//! ```

pub mod catalog;
pub mod checkpoint;
pub mod error;
pub mod executor;
pub mod lock;
pub mod registry;
pub mod report;
pub mod runner;
pub mod unit;

// Catalog types
pub use catalog::{load_catalog, MigrationCatalog};

// Checkpoint types
pub use checkpoint::CheckpointStore;

// Error types
pub use error::{FailureKind, MigrationError, UnitError, UnitFailure};

// Executor types
pub use executor::MigrationExecutor;

// Lease types
pub use lock::RunLease;

// Registry types
pub use registry::MigrationRegistry;

// Report types
pub use report::{ErrorEntry, ExecutedEntry, RunReport, UnitStatus};

// Runner types
pub use runner::{MigrationRunner, RunOptions};

// Unit types
pub use unit::{MigrationBody, MigrationId, MigrationUnit, UnitBody};
