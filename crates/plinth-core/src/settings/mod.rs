//! Durable key-value settings used to persist runner state.
//!
//! The host platform owns the real settings facility. The runner only needs
//! whole-value `get`/`set` semantics, so any store that is durable across
//! restarts and read-after-write consistent within a process will do.

mod memory;
mod sled_store;

pub use memory::MemorySettings;
pub use sled_store::SledSettings;

use crate::error::Error;

/// A durable key-value settings store.
pub trait SettingsStore {
    /// Get the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), Error>;

    /// Remove the value stored under `key`.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for &S {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), Error> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        (**self).remove(key)
    }
}

impl<S: SettingsStore + ?Sized> SettingsStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), Error> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        (**self).remove(key)
    }
}
