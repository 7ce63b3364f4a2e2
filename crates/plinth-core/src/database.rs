//! Transactional SQLite handle used by migration bodies.

use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::config::DatabaseConfig;
use crate::error::Error;

/// The database migrations run against.
///
/// Every migration unit gets its own transaction from [`Database::begin`].
/// The handle counts how many of those it has opened.
pub struct Database {
    conn: Connection,
    transactions_opened: AtomicU64,
}

impl Database {
    /// Open a database with the given configuration, creating its directory if needed.
    pub fn open(config: &DatabaseConfig) -> Result<Self, Error> {
        let conn = match &config.path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path)?
            }
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(config.busy_timeout)?;
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::open(&DatabaseConfig::in_memory())
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            transactions_opened: AtomicU64::new(0),
        }
    }

    /// Begin an immediate transaction for one migration unit.
    pub fn begin(&mut self) -> Result<Transaction<'_>, Error> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        self.transactions_opened.fetch_add(1, Ordering::Relaxed);
        Ok(tx)
    }

    /// Number of transactions opened through [`Database::begin`].
    pub fn transactions_opened(&self) -> u64 {
        self.transactions_opened.load(Ordering::Relaxed)
    }

    /// Borrow the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Borrow the underlying connection mutably, bypassing the transaction counter.
    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Check whether a table exists.
    pub fn table_exists(&self, name: &str) -> Result<bool, Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
