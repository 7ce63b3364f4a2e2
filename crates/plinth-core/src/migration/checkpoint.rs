//! Checkpoint persistence.
//!
//! Tracks which migration units have completed so a later run skips them.

use std::collections::BTreeSet;

use tracing::warn;

use super::error::MigrationError;
use super::unit::MigrationId;
use crate::config::DEFAULT_CHECKPOINT_KEY;
use crate::settings::SettingsStore;

/// The durable set of completed migration ids.
///
/// The set is stored under one settings key as a sorted JSON array and is
/// rewritten as a whole on every change.
pub struct CheckpointStore<S> {
    settings: S,
    key: String,
}

impl<S: SettingsStore> CheckpointStore<S> {
    /// Create a store using the default settings key.
    pub fn new(settings: S) -> Self {
        Self::with_key(settings, DEFAULT_CHECKPOINT_KEY)
    }

    /// Create a store using a custom settings key.
    pub fn with_key(settings: S, key: impl Into<String>) -> Self {
        Self {
            settings,
            key: key.into(),
        }
    }

    /// The settings key holding the set.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Borrow the backing settings store.
    pub fn settings(&self) -> &S {
        &self.settings
    }

    /// Load the completed set. Empty if nothing was ever recorded.
    pub fn load_completed(&self) -> Result<BTreeSet<MigrationId>, MigrationError> {
        match self.settings.get(&self.key)? {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(BTreeSet::new()),
        }
    }

    /// Check whether `id` has completed.
    pub fn is_completed(&self, id: &MigrationId) -> Result<bool, MigrationError> {
        Ok(self.load_completed()?.contains(id))
    }

    /// Record `id` as completed and persist immediately.
    ///
    /// Recording an id twice is a no-op.
    pub fn mark_completed(&self, id: &MigrationId) -> Result<(), MigrationError> {
        let mut completed = self.load_completed()?;
        if !completed.insert(id.clone()) {
            return Ok(());
        }
        self.save(&completed)
    }

    /// Forget every completed migration.
    ///
    /// The next run re-executes the whole catalog.
    pub fn reset(&self) -> Result<(), MigrationError> {
        warn!(key = %self.key, "resetting migration checkpoints");
        self.settings.remove(&self.key)?;
        Ok(())
    }

    fn save(&self, completed: &BTreeSet<MigrationId>) -> Result<(), MigrationError> {
        let bytes = serde_json::to_vec(completed).map_err(|e| {
            MigrationError::Storage(crate::error::Error::Serialization(e.to_string()))
        })?;
        self.settings.set(&self.key, &bytes)?;
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<BTreeSet<MigrationId>, MigrationError> {
        serde_json::from_slice(bytes).map_err(|e| MigrationError::CheckpointCorrupted {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsConfig;
    use crate::settings::{MemorySettings, SledSettings};

    fn id(s: &str) -> MigrationId {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_when_uninitialized() {
        let store = CheckpointStore::new(MemorySettings::new());
        assert!(store.load_completed().unwrap().is_empty());
    }

    #[test]
    fn test_mark_completed_is_idempotent() {
        let store = CheckpointStore::new(MemorySettings::new());

        store.mark_completed(&id("002")).unwrap();
        store.mark_completed(&id("001")).unwrap();
        store.mark_completed(&id("002")).unwrap();

        let completed: Vec<MigrationId> = store.load_completed().unwrap().into_iter().collect();
        assert_eq!(completed, vec![id("001"), id("002")]);
        // The duplicate mark did not write.
        assert_eq!(store.settings().write_count(), 2);
    }

    #[test]
    fn test_stored_as_sorted_json_array() {
        let store = CheckpointStore::with_key(MemorySettings::new(), "done");
        store.mark_completed(&id("010")).unwrap();
        store.mark_completed(&id("003")).unwrap();

        let raw = store.settings().get("done").unwrap().unwrap();
        assert_eq!(raw, br#"["003","010"]"#.to_vec());
    }

    #[test]
    fn test_reset_clears() {
        let store = CheckpointStore::new(MemorySettings::new());
        store.mark_completed(&id("001")).unwrap();
        store.reset().unwrap();
        assert!(!store.is_completed(&id("001")).unwrap());
    }

    #[test]
    fn test_corrupted_value() {
        let settings = MemorySettings::new();
        settings.set(DEFAULT_CHECKPOINT_KEY, b"[\"1\"]").unwrap();
        let store = CheckpointStore::new(settings);

        let result = store.load_completed();
        assert!(matches!(result, Err(MigrationError::CheckpointCorrupted { .. })));
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = SettingsConfig::new(temp_dir.path());

        {
            let store = CheckpointStore::new(SledSettings::open(&config).unwrap());
            store.mark_completed(&id("001")).unwrap();
            store.mark_completed(&id("002")).unwrap();
        }

        let store = CheckpointStore::new(SledSettings::open(&config).unwrap());
        let completed = store.load_completed().unwrap();
        assert_eq!(completed.len(), 2);
        assert!(completed.contains(&id("002")));
    }
}
