//! Code-defined migration bodies keyed by id.

use std::collections::BTreeMap;
use std::sync::Arc;

use rusqlite::Transaction;

use super::error::{MigrationError, UnitError};
use super::unit::{MigrationBody, MigrationId};

/// Bodies for migrations whose source file is not a SQL script.
///
/// The catalog loader attaches the body registered under a unit's id
/// directly to the unit.
#[derive(Default, Clone)]
pub struct MigrationRegistry {
    bodies: BTreeMap<MigrationId, Arc<dyn MigrationBody>>,
}

impl MigrationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure as the body for `id`. Replaces any previous body.
    pub fn register<F>(&mut self, id: &str, body: F) -> Result<&mut Self, MigrationError>
    where
        F: Fn(&Transaction<'_>) -> Result<(), UnitError> + Send + Sync + 'static,
    {
        self.register_body(id, Arc::new(body))
    }

    /// Register a shared body for `id`. Replaces any previous body.
    pub fn register_body(
        &mut self,
        id: &str,
        body: Arc<dyn MigrationBody>,
    ) -> Result<&mut Self, MigrationError> {
        let id: MigrationId = id.parse()?;
        self.bodies.insert(id, body);
        Ok(self)
    }

    /// Look up the body for `id`.
    pub fn get(&self, id: &MigrationId) -> Option<Arc<dyn MigrationBody>> {
        self.bodies.get(id).cloned()
    }

    /// Check whether a body is registered for `id`.
    pub fn contains(&self, id: &MigrationId) -> bool {
        self.bodies.contains_key(id)
    }

    /// Number of registered bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.bodies.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = MigrationRegistry::new();
        registry
            .register("001", |tx| {
                tx.execute_batch("CREATE TABLE t (id INTEGER)")?;
                Ok(())
            })
            .unwrap();

        let id: MigrationId = "001".parse().unwrap();
        assert!(registry.contains(&id));
        assert!(registry.get(&id).is_some());
        assert!(registry.get(&"002".parse().unwrap()).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_bad_id() {
        let mut registry = MigrationRegistry::new();
        let result = registry.register("1", |_| Ok(()));
        assert!(matches!(result, Err(MigrationError::InvalidId(_))));
        assert!(registry.is_empty());
    }
}
