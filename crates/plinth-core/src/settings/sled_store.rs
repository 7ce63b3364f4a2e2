//! sled-backed settings store.

use super::SettingsStore;
use crate::config::SettingsConfig;
use crate::error::Error;

/// Settings persisted in a sled tree.
///
/// Every write is flushed before returning, so a value that `set` accepted
/// survives a process crash.
pub struct SledSettings {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledSettings {
    /// Tree name for settings.
    pub const TREE_NAME: &'static str = "settings";

    /// Open or create a settings store with the given configuration.
    pub fn open(config: &SettingsConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        Self::from_db(db)
    }

    /// Use the settings tree of an already opened sled database.
    pub fn from_db(db: sled::Db) -> Result<Self, Error> {
        let tree = db.open_tree(Self::TREE_NAME)?;
        Ok(Self { db, tree })
    }
}

impl SettingsStore for SledSettings {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), Error> {
        self.tree.insert(key.as_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.tree.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}
