//! Migration catalog discovery.
//!
//! A catalog is the ordered set of migration units found in a directory.
//! Files are named `NNN-description.ext`: exactly three digits, a `-`, and
//! free text. Everything else in the directory is ignored.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use super::error::MigrationError;
use super::registry::MigrationRegistry;
use super::unit::{MigrationId, MigrationUnit, UnitBody};

/// Extension marking a unit as a SQL script.
pub const SQL_EXTENSION: &str = "sql";

/// Migration units ordered by id.
#[derive(Debug, Clone, Default)]
pub struct MigrationCatalog {
    units: BTreeMap<MigrationId, MigrationUnit>,
}

impl MigrationCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a unit, returning the unit it replaced.
    pub fn insert(&mut self, unit: MigrationUnit) -> Option<MigrationUnit> {
        self.units.insert(unit.id.clone(), unit)
    }

    /// Get a unit by id.
    pub fn get(&self, id: &MigrationId) -> Option<&MigrationUnit> {
        self.units.get(id)
    }

    /// Iterate units in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &MigrationUnit> {
        self.units.values()
    }

    /// Iterate ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &MigrationId> {
        self.units.keys()
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Scan `directory` for migration units.
///
/// A missing directory yields an empty catalog. Entries are visited in
/// file-name order; when two files share an id the later name wins.
/// Bodies are located but never loaded or executed.
pub fn load_catalog(
    directory: &Path,
    registry: &MigrationRegistry,
) -> Result<MigrationCatalog, MigrationError> {
    let mut catalog = MigrationCatalog::new();

    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %directory.display(), "migrations directory missing");
            return Ok(catalog);
        }
        Err(e) => {
            return Err(MigrationError::Catalog {
                path: directory.to_path_buf(),
                source: e,
            })
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MigrationError::Catalog {
            path: directory.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            files.push((name.to_string(), path));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, path) in files {
        let Some((id, rest)) = MigrationId::from_file_name(&name) else {
            continue;
        };

        let is_sql = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SQL_EXTENSION));
        let description = match rest.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => rest,
        };

        let body = if is_sql {
            UnitBody::Sql
        } else {
            registry.get(&id).map_or(UnitBody::Unresolved, UnitBody::Code)
        };

        let unit = MigrationUnit::new(id, path, description, body);
        let winner = unit.source.clone();
        if let Some(previous) = catalog.insert(unit) {
            warn!(
                id = %previous.id,
                replaced = %previous.source.display(),
                winner = %winner.display(),
                "duplicate migration id, later file wins"
            );
        }
    }

    debug!(path = %directory.display(), count = catalog.len(), "migration catalog loaded");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::fs;
    use std::sync::Arc;

    fn touch(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = load_catalog(&dir.path().join("nope"), &MigrationRegistry::new()).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_filters_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "003-add-index.sql", "CREATE INDEX i ON t(id);");
        touch(dir.path(), "001-create-table.sql", "CREATE TABLE t (id INTEGER);");
        touch(dir.path(), "002-seed.rs", "");
        touch(dir.path(), "README.md", "");
        touch(dir.path(), "0004-too-wide.sql", "");
        touch(dir.path(), "05-too-narrow.sql", "");
        touch(dir.path(), "006_no_dash.sql", "");
        fs::create_dir(dir.path().join("007-a-directory")).unwrap();

        let catalog = load_catalog(dir.path(), &MigrationRegistry::new()).unwrap();
        let ids: Vec<&str> = catalog.ids().map(MigrationId::as_str).collect();
        assert_eq!(ids, vec!["001", "002", "003"]);

        let first = catalog.get(&"001".parse().unwrap()).unwrap();
        assert_eq!(first.description, "create-table");
        assert!(matches!(first.body, UnitBody::Sql));

        let second = catalog.get(&"002".parse().unwrap()).unwrap();
        assert!(matches!(second.body, UnitBody::Unresolved));
    }

    #[test]
    fn test_registry_body_attached() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "001-seed-data.rs", "");

        let mut registry = MigrationRegistry::new();
        registry.register("001", |_| Ok(())).unwrap();

        let catalog = load_catalog(dir.path(), &registry).unwrap();
        let unit = catalog.get(&"001".parse().unwrap()).unwrap();
        assert!(matches!(unit.body, UnitBody::Code(_)));
        assert_eq!(unit.description, "seed-data");
    }

    #[test]
    fn test_duplicate_id_last_name_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "001-a.sql", "");
        touch(dir.path(), "001-b.sql", "");

        let catalog = load_catalog(dir.path(), &MigrationRegistry::new()).unwrap();
        assert_eq!(catalog.len(), 1);
        let unit = catalog.get(&"001".parse().unwrap()).unwrap();
        assert_eq!(unit.source_label(), "001-b.sql");
    }

    #[derive(Clone)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_duplicate_warning_names_both_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "001-a.sql", "");
        touch(dir.path(), "001-b.sql", "");

        let logs = LogBuffer(Arc::new(Mutex::new(Vec::new())));
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            load_catalog(dir.path(), &MigrationRegistry::new()).unwrap();
        });

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        let line = output
            .lines()
            .find(|line| line.contains("duplicate migration id"))
            .unwrap();
        assert!(line.contains("replaced="));
        assert!(line.contains("001-a.sql"));
        assert!(line.contains("winner="));
        assert!(line.contains("001-b.sql"));
    }
}
