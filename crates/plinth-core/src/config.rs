//! Runner, lease, database and settings configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default settings key holding the completed migration set.
pub const DEFAULT_CHECKPOINT_KEY: &str = "plinth_migrations_completed";

/// Default name of the run lease row.
pub const DEFAULT_LOCK_NAME: &str = "migrations";

/// Default lease lifetime in seconds (10 minutes).
pub const DEFAULT_LOCK_TTL_SECS: u64 = 600;

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Configuration for the cross-process run lease.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Lease row name. Runners sharing a name exclude each other.
    pub name: String,

    /// How long a lease stays valid without being released.
    /// A crashed holder blocks other runners for at most this long.
    pub ttl: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_LOCK_NAME.to_string(),
            ttl: Duration::from_secs(DEFAULT_LOCK_TTL_SECS),
        }
    }
}

impl LockConfig {
    /// Set the lease name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the lease lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Configuration for the migration runner.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory scanned for `NNN-description` migration files.
    pub directory: PathBuf,

    /// Settings key under which the completed set is stored.
    pub checkpoint_key: String,

    /// Treat a unit without an entry point as a failure.
    /// When false, such a unit commits as a no-op and is checkpointed.
    pub strict_entry_points: bool,

    /// Run lease. None disables cross-process exclusion.
    pub lock: Option<LockConfig>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./migrations"),
            checkpoint_key: DEFAULT_CHECKPOINT_KEY.to_string(),
            strict_entry_points: true,
            lock: Some(LockConfig::default()),
        }
    }
}

impl MigrationConfig {
    /// Create a configuration for the given migrations directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    /// Set the checkpoint key.
    pub fn with_checkpoint_key(mut self, key: impl Into<String>) -> Self {
        self.checkpoint_key = key.into();
        self
    }

    /// Accept units without an entry point as successful no-ops.
    pub fn permissive_entry_points(mut self) -> Self {
        self.strict_entry_points = false;
        self
    }

    /// Set the lease configuration.
    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Disable the run lease.
    pub fn without_lock(mut self) -> Self {
        self.lock = None;
        self
    }
}

/// Configuration for the migration database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite file. None opens an in-memory database.
    pub path: Option<PathBuf>,

    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

impl DatabaseConfig {
    /// Create a configuration for a database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Create an in-memory configuration for testing.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Configuration for the sled-backed settings store.
#[derive(Debug, Clone)]
pub struct SettingsConfig {
    /// Path to the settings directory.
    pub path: PathBuf,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Background flush interval in milliseconds. Writes are also flushed explicitly.
    pub flush_every_ms: Option<u64>,

    /// Temporary store (deleted on drop).
    pub temporary: bool,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./plinth_settings"),
            cache_capacity: 16 * 1024 * 1024, // 16MB
            flush_every_ms: Some(500),
            temporary: false,
        }
    }
}

impl SettingsConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary configuration for testing.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::from(""),
            temporary: true,
            ..Default::default()
        }
    }

    /// Convert to sled configuration.
    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new().cache_capacity(self.cache_capacity);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }

        if let Some(ms) = self.flush_every_ms {
            config = config.flush_every_ms(Some(ms));
        }

        config
    }
}
