//! Migration runner - applies pending units in order.
//!
//! Each run re-derives its work from the catalog and the checkpoint store:
//! completed units are skipped, pending units are executed in ascending id
//! order, and the first failure halts the run. Units after the failing one
//! are left untouched and retried verbatim on the next run.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::catalog::{load_catalog, MigrationCatalog};
use super::checkpoint::CheckpointStore;
use super::error::MigrationError;
use super::executor::MigrationExecutor;
use super::lock::RunLease;
use super::registry::MigrationRegistry;
use super::report::{RunReport, UnitStatus};
use super::unit::MigrationId;
use crate::config::MigrationConfig;
use crate::database::Database;
use crate::settings::SettingsStore;

/// Options for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Report pending units without executing or recording them.
    pub dry_run: bool,
    /// Stop after this id. Later units are not considered.
    pub target: Option<MigrationId>,
}

impl RunOptions {
    /// Options for a dry run.
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Default::default()
        }
    }

    /// Only consider units up to and including `target`.
    pub fn up_to(mut self, target: MigrationId) -> Self {
        self.target = Some(target);
        self
    }
}

/// Orchestrates catalog, checkpoint store, executor and lease.
pub struct MigrationRunner<S> {
    config: MigrationConfig,
    registry: MigrationRegistry,
    checkpoints: CheckpointStore<S>,
    executor: MigrationExecutor,
    lease: Option<RunLease>,
}

impl<S: SettingsStore> MigrationRunner<S> {
    /// Create a runner over the given settings store.
    pub fn new(config: MigrationConfig, settings: S) -> Self {
        let checkpoints = CheckpointStore::with_key(settings, config.checkpoint_key.clone());
        let executor = MigrationExecutor::new(config.strict_entry_points);
        let lease = config.lock.as_ref().map(RunLease::new);

        Self {
            config,
            registry: MigrationRegistry::new(),
            checkpoints,
            executor,
            lease,
        }
    }

    /// Use `registry` to resolve code-defined migration bodies.
    pub fn with_registry(mut self, registry: MigrationRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The checkpoint store.
    pub fn checkpoints(&self) -> &CheckpointStore<S> {
        &self.checkpoints
    }

    /// Scan the migrations directory.
    pub fn catalog(&self) -> Result<MigrationCatalog, MigrationError> {
        load_catalog(&self.config.directory, &self.registry)
    }

    /// Apply pending migrations.
    ///
    /// Unit failures end up in the report; the returned error covers
    /// failures of the run itself (catalog, checkpoint store, lease).
    /// The lease is renewed before every unit; if another runner has taken
    /// it over in the meantime the run stops with [`MigrationError::LockHeld`].
    pub fn run(&self, db: &mut Database, options: RunOptions) -> Result<RunReport, MigrationError> {
        let lease = if options.dry_run { None } else { self.lease.as_ref() };

        if let Some(lease) = lease {
            lease.acquire(db)?;
        }

        let result = self.run_unlocked(db, &options, lease);

        if let Some(lease) = lease {
            if let Err(e) = lease.release(db) {
                warn!(name = %lease.name(), error = %e, "failed to release migration lease");
            }
        }

        result
    }

    fn run_unlocked(
        &self,
        db: &mut Database,
        options: &RunOptions,
        lease: Option<&RunLease>,
    ) -> Result<RunReport, MigrationError> {
        let mut report = RunReport::new();

        let catalog = self.catalog()?;
        if catalog.is_empty() {
            debug!("no migrations found");
            return Ok(report);
        }

        let completed = self.checkpoints.load_completed()?;
        info!(
            total = catalog.len(),
            completed = completed.len(),
            dry_run = options.dry_run,
            "starting migration run"
        );

        for unit in catalog.iter() {
            if options.target.as_ref().is_some_and(|target| unit.id > *target) {
                break;
            }

            if completed.contains(&unit.id) {
                debug!(id = %unit.id, "already applied, skipping");
                report.record_skipped(unit);
                continue;
            }

            if options.dry_run {
                debug!(id = %unit.id, source = %unit.source_label(), "would apply");
                report.record_executed(unit, true);
                continue;
            }

            // Extend the lease before each unit.
            if let Some(lease) = lease {
                lease.acquire(db)?;
            }

            match self.executor.execute(unit, db, &self.checkpoints) {
                Ok(()) => report.record_executed(unit, false),
                Err(failure) => {
                    report.record_error(&failure);
                    break;
                }
            }
        }

        info!(
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            failed = report.errors.len(),
            "migration run finished"
        );
        Ok(report)
    }

    /// Ids in the catalog that have not completed, in catalog order.
    pub fn pending_ids(&self) -> Result<Vec<MigrationId>, MigrationError> {
        let catalog = self.catalog()?;
        let completed = self.checkpoints.load_completed()?;
        Ok(pending_in(&catalog, &completed))
    }

    /// Check whether any catalog unit has not completed.
    pub fn has_pending(&self) -> Result<bool, MigrationError> {
        Ok(!self.pending_ids()?.is_empty())
    }

    /// Status of every catalog unit.
    pub fn status(&self) -> Result<Vec<UnitStatus>, MigrationError> {
        let catalog = self.catalog()?;
        let completed = self.checkpoints.load_completed()?;
        Ok(catalog
            .iter()
            .map(|unit| UnitStatus {
                id: unit.id.clone(),
                description: unit.description.clone(),
                source: unit.source.clone(),
                body: unit.body.label(),
                applied: completed.contains(&unit.id),
            })
            .collect())
    }

    /// Ids recorded as completed.
    pub fn completed_ids(&self) -> Result<BTreeSet<MigrationId>, MigrationError> {
        self.checkpoints.load_completed()
    }

    /// Forget all checkpoints. The next run re-executes every unit.
    pub fn reset(&self) -> Result<(), MigrationError> {
        self.checkpoints.reset()
    }
}

fn pending_in(catalog: &MigrationCatalog, completed: &BTreeSet<MigrationId>) -> Vec<MigrationId> {
    catalog
        .ids()
        .filter(|id| !completed.contains(*id))
        .cloned()
        .collect()
}
