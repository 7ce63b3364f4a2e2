//! Plinth Core - versioned schema migrations for admin plugins.
//!
//! This crate discovers numbered migration units, applies the pending ones
//! in order against a SQLite database and records completed units in a
//! durable settings store.

pub mod config;
pub mod database;
pub mod error;
pub mod migration;
pub mod settings;

pub use config::{DatabaseConfig, LockConfig, MigrationConfig, SettingsConfig};
pub use database::Database;
pub use error::Error;
pub use migration::{
    load_catalog, CheckpointStore, ErrorEntry, ExecutedEntry, FailureKind, MigrationBody,
    MigrationCatalog, MigrationError, MigrationExecutor, MigrationId, MigrationRegistry,
    MigrationRunner, MigrationUnit, RunLease, RunOptions, RunReport, UnitBody, UnitError,
    UnitFailure, UnitStatus,
};
pub use settings::{MemorySettings, SettingsStore, SledSettings};

/// Re-export of the SQLite transaction type handed to migration bodies.
pub use rusqlite::Transaction;
