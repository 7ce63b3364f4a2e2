//! In-memory settings store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::SettingsStore;
use crate::error::Error;

/// Settings kept in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, Vec<u8>>>,
    writes: AtomicU64,
}

impl MemorySettings {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` and `remove` calls served so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), Error> {
        self.values.write().insert(key.to_string(), value.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.values.write().remove(key);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
