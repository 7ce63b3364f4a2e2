//! Cross-process run lease.
//!
//! A single row in the migration database records which runner owns the
//! right to apply migrations and until when. Runners that share a database
//! exclude each other; a holder that crashed stops blocking others once its
//! lease expires.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::error::MigrationError;
use crate::config::LockConfig;
use crate::database::Database;
use crate::error::Error;

/// Table holding lease rows.
pub const LOCK_TABLE: &str = "plinth_migration_lock";

/// A lease held (or wanted) by one runner.
#[derive(Debug, Clone)]
pub struct RunLease {
    name: String,
    owner: String,
    ttl: Duration,
}

impl RunLease {
    /// Create a lease with a fresh random owner id.
    pub fn new(config: &LockConfig) -> Self {
        Self::with_owner(config, uuid::Uuid::new_v4().to_string())
    }

    /// Create a lease with an explicit owner id.
    pub fn with_owner(config: &LockConfig, owner: impl Into<String>) -> Self {
        Self {
            name: config.name.clone(),
            owner: owner.into(),
            ttl: config.ttl,
        }
    }

    /// The lease name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This runner's owner id.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Take the lease, or extend it if this owner already holds it.
    ///
    /// Fails with [`MigrationError::LockHeld`] while another owner holds an
    /// unexpired lease.
    pub fn acquire(&self, db: &mut Database) -> Result<(), MigrationError> {
        let now = now_millis();
        let expires_at = now.saturating_add(millis(self.ttl));

        let conn = db.connection_mut();
        ensure_table(conn)?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(Error::from)?;

        tx.execute(
            &format!("DELETE FROM {LOCK_TABLE} WHERE name = ?1 AND expires_at <= ?2"),
            params![self.name, now],
        )
        .map_err(Error::from)?;

        let holder: Option<(String, i64)> = tx
            .query_row(
                &format!("SELECT owner, expires_at FROM {LOCK_TABLE} WHERE name = ?1"),
                params![self.name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(Error::from)?;

        match holder {
            Some((owner, expires_at_ms)) if owner != self.owner => {
                // Dropping the transaction rolls back the expiry cleanup, which is harmless.
                return Err(MigrationError::LockHeld {
                    name: self.name.clone(),
                    owner,
                    expires_at_ms,
                });
            }
            Some(_) => {
                tx.execute(
                    &format!("UPDATE {LOCK_TABLE} SET expires_at = ?2 WHERE name = ?1"),
                    params![self.name, expires_at],
                )
                .map_err(Error::from)?;
            }
            None => {
                tx.execute(
                    &format!(
                        "INSERT INTO {LOCK_TABLE} (name, owner, expires_at) VALUES (?1, ?2, ?3)"
                    ),
                    params![self.name, self.owner, expires_at],
                )
                .map_err(Error::from)?;
            }
        }

        tx.commit().map_err(Error::from)?;
        debug!(name = %self.name, owner = %self.owner, expires_at, "migration lease acquired");
        Ok(())
    }

    /// Give the lease up. Does nothing if another owner holds it.
    pub fn release(&self, db: &mut Database) -> Result<(), MigrationError> {
        let conn = db.connection_mut();
        ensure_table(conn)?;
        let removed = conn
            .execute(
                &format!("DELETE FROM {LOCK_TABLE} WHERE name = ?1 AND owner = ?2"),
                params![self.name, self.owner],
            )
            .map_err(Error::from)?;
        debug!(name = %self.name, owner = %self.owner, removed, "migration lease released");
        Ok(())
    }

    /// Current holder and expiry of the named lease, if any.
    pub fn holder(db: &Database, name: &str) -> Result<Option<(String, i64)>, MigrationError> {
        let conn = db.connection();
        ensure_table(conn)?;
        let holder = conn
            .query_row(
                &format!("SELECT owner, expires_at FROM {LOCK_TABLE} WHERE name = ?1"),
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(Error::from)?;
        Ok(holder)
    }
}

fn ensure_table(conn: &rusqlite::Connection) -> Result<(), MigrationError> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {LOCK_TABLE} (
            name TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        )"
    ))
    .map_err(Error::from)?;
    Ok(())
}

/// Milliseconds since the Unix epoch.
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or(0)
}

/// Whole milliseconds in `duration`, saturating at `i64::MAX`.
fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
