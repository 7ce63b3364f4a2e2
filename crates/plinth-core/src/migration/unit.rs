//! Migration units and their bodies.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use rusqlite::Transaction;
use serde::{Deserialize, Serialize};

use super::error::{MigrationError, UnitError};

/// Width of a migration id.
pub const ID_WIDTH: usize = 3;

/// A fixed-width, zero-padded migration ordinal such as `"007"`.
///
/// Ids are always exactly three ASCII digits, so ordering them as strings
/// orders them numerically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MigrationId(String);

impl MigrationId {
    /// Create an id from its ordinal. Fails above 999.
    pub fn from_number(number: u16) -> Result<Self, MigrationError> {
        format!("{number:03}").parse()
    }

    /// The id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric ordinal.
    pub fn number(&self) -> u16 {
        self.0
            .bytes()
            .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'))
    }

    /// Extract the id prefix from a `NNN-description` file name.
    ///
    /// Returns the id and the remainder after the `-` separator.
    pub fn from_file_name(name: &str) -> Option<(Self, &str)> {
        let prefix = name.get(..ID_WIDTH)?;
        let rest = name.get(ID_WIDTH..)?.strip_prefix('-')?;
        let id = prefix.parse().ok()?;
        Some((id, rest))
    }
}

impl FromStr for MigrationId {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == ID_WIDTH && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(MigrationError::InvalidId(s.to_string()))
        }
    }
}

impl TryFrom<String> for MigrationId {
    type Error = MigrationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MigrationId> for String {
    fn from(id: MigrationId) -> Self {
        id.0
    }
}

impl std::fmt::Display for MigrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Code that performs one migration inside the transaction it is given.
///
/// Bodies must be idempotent: a crash between commit and checkpoint write
/// makes the runner apply the same unit again.
pub trait MigrationBody: Send + Sync {
    /// Apply the migration.
    fn apply(&self, tx: &Transaction<'_>) -> Result<(), UnitError>;
}

impl<F> MigrationBody for F
where
    F: Fn(&Transaction<'_>) -> Result<(), UnitError> + Send + Sync,
{
    fn apply(&self, tx: &Transaction<'_>) -> Result<(), UnitError> {
        self(tx)
    }
}

/// How a unit executes.
#[derive(Clone)]
pub enum UnitBody {
    /// The source file is a SQL script executed as one batch.
    Sql,
    /// A body registered in code for this id.
    Code(Arc<dyn MigrationBody>),
    /// Nothing can execute this unit.
    Unresolved,
}

impl UnitBody {
    /// Short label for status output.
    pub fn label(&self) -> &'static str {
        match self {
            UnitBody::Sql => "sql",
            UnitBody::Code(_) => "code",
            UnitBody::Unresolved => "unresolved",
        }
    }
}

impl std::fmt::Debug for UnitBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One versioned schema change discovered in the catalog.
#[derive(Debug, Clone)]
pub struct MigrationUnit {
    /// Ordering key.
    pub id: MigrationId,
    /// File the unit was discovered from.
    pub source: PathBuf,
    /// Free-text label taken from the file name.
    pub description: String,
    /// Executable body.
    pub body: UnitBody,
}

impl MigrationUnit {
    /// Create a unit.
    pub fn new(
        id: MigrationId,
        source: impl Into<PathBuf>,
        description: impl Into<String>,
        body: UnitBody,
    ) -> Self {
        Self {
            id,
            source: source.into(),
            description: description.into(),
            body,
        }
    }

    /// The source file name, used as the label in reports.
    pub fn source_label(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }

    /// Check whether the source file still exists.
    pub fn source_exists(&self) -> bool {
        Path::new(&self.source).is_file()
    }
}
