//! The reconciliation session.
//!
//! A [`Session`] owns the working set for one store. It scans on open,
//! accepts desired-state edits, and commits them through the mutation
//! engine. Every batch that can touch the store (apply, restore, reset)
//! is preceded by a fresh backup; if that backup cannot be written the
//! batch does not start.

use crate::MenuContext;
use crate::model::tracker::{ChangeObserver, WorkingSet};
use crate::model::{ItemKey, MenuItem, Scenario};
use crate::mutation::{ApplyReport, MutationEngine};
use crate::notify::ShellNotifier;
use crate::scanner::NamespaceScanner;
use crate::storage::backups::{self, BackupManager};
use crate::storage::BackupRecord;
use crate::store::RegistryStore;
use crate::sync;
use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Description of the backup taken before committing pending edits.
pub const BEFORE_APPLY: &str = "before apply";
/// Description of the backup taken before restoring a backup.
pub const BEFORE_RESTORE: &str = "before restore";
/// Description of the backup taken before resetting to the rollback default.
pub const BEFORE_RESET: &str = "before reset";

/// Session settings taken from the configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Directory holding backups and the first-run flag
    pub data_dir: PathBuf,
    /// Scenarios to scan
    pub scenarios: Vec<Scenario>,
    /// Backups kept by automatic cleanup
    pub retention: usize,
    /// Prune after every automatic backup
    pub auto_cleanup: bool,
}

impl SessionOptions {
    /// Options from a context's configuration.
    #[must_use]
    pub fn from_context(ctx: &MenuContext) -> Self {
        Self {
            data_dir: ctx.data_dir.clone(),
            scenarios: ctx.config.scan.scenarios.clone(),
            retention: ctx.config.backup.retention,
            auto_cleanup: ctx.config.backup.auto_cleanup,
        }
    }
}

/// One reconciliation session over a store.
pub struct Session {
    scanner: NamespaceScanner,
    engine: MutationEngine,
    backups: BackupManager,
    notifier: Arc<dyn ShellNotifier>,
    working_set: WorkingSet,
    options: SessionOptions,
    status: Vec<String>,
}

impl Session {
    /// Opens a session for `ctx` over `store`.
    #[must_use]
    pub fn open(
        ctx: &MenuContext,
        store: Arc<dyn RegistryStore>,
        notifier: Arc<dyn ShellNotifier>,
    ) -> Self {
        Self::with_options(SessionOptions::from_context(ctx), store, notifier)
    }

    /// Opens a session: scans, then runs the first-run bootstrap.
    ///
    /// Never fails. A bootstrap failure is recorded as a status message and
    /// the session continues with whatever the scan produced.
    #[must_use]
    pub fn with_options(
        options: SessionOptions,
        store: Arc<dyn RegistryStore>,
        notifier: Arc<dyn ShellNotifier>,
    ) -> Self {
        let scanner = NamespaceScanner::new(Arc::clone(&store));
        let items = scanner.scan_scenarios(&options.scenarios);
        info!(items = items.len(), "Session opened");

        let mut session = Self {
            scanner,
            engine: MutationEngine::new(store),
            backups: BackupManager::new(&options.data_dir),
            notifier,
            working_set: WorkingSet::new(items),
            options,
            status: Vec::new(),
        };

        if let Err(e) = session.backups.first_run_bootstrap(session.working_set.items()) {
            warn!(error = %e, "First-run backup failed");
            session
                .status
                .push(format!("Could not record the rollback default: {e:#}"));
        }
        session
    }

    /// Every scanned item.
    #[must_use]
    pub fn items(&self) -> &[MenuItem] {
        self.working_set.items()
    }

    /// Status messages collected while opening the session.
    #[must_use]
    pub fn status_messages(&self) -> &[String] {
        &self.status
    }

    /// The backup manager of this session.
    #[must_use]
    pub const fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Registers an observer for desired-state changes.
    pub fn subscribe(&mut self, observer: ChangeObserver) {
        self.working_set.subscribe(observer);
    }

    /// Whether any item has an uncommitted edit.
    #[must_use]
    pub const fn has_unapplied_changes(&self) -> bool {
        self.working_set.has_unapplied_changes()
    }

    /// Sets the desired state of the item with `key`.
    ///
    /// Returns whether the desired state changed.
    ///
    /// # Errors
    ///
    /// Returns an error if no such item exists or it cannot be toggled.
    pub fn set_enabled(&mut self, key: &ItemKey, value: bool) -> Result<bool> {
        let index = self
            .working_set
            .position(key)
            .with_context(|| format!("No item {key}"))?;
        self.set_enabled_at(index, value)
    }

    /// Sets the desired state of every item `id` in `scenario`.
    ///
    /// An id registered under several class bases of the scenario (e.g. `*`
    /// and `AllFilesystemObjects`) is one entry to the user, so all copies
    /// change together. Returns whether any desired state changed.
    ///
    /// # Errors
    ///
    /// Returns an error if no such item exists or none can be toggled.
    pub fn set_enabled_by_id(&mut self, scenario: Scenario, id: &str, value: bool) -> Result<bool> {
        let indices = self.working_set.positions_by_id(scenario, id);
        if indices.is_empty() {
            bail!("No item '{id}' in scenario {scenario}");
        }

        let toggleable: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&index| {
                self.working_set
                    .get(index)
                    .is_some_and(MenuItem::is_toggleable)
            })
            .collect();
        if toggleable.is_empty() {
            return self.set_enabled_at(indices[0], value);
        }

        let mut changed = false;
        for index in toggleable {
            changed |= self.working_set.set_enabled(index, value);
        }
        Ok(changed)
    }

    fn set_enabled_at(&mut self, index: usize, value: bool) -> Result<bool> {
        if let Some(item) = self.working_set.get(index)
            && !item.is_toggleable()
        {
            bail!("'{}' has no supported disable method", item.id);
        }
        Ok(self.working_set.set_enabled(index, value))
    }

    /// Dirty items whose commit needs elevation.
    #[must_use]
    pub fn pending_admin_items(&self) -> Vec<&MenuItem> {
        self.working_set
            .items()
            .iter()
            .filter(|item| item.has_changes() && item.requires_admin)
            .collect()
    }

    /// Dirty items.
    #[must_use]
    pub fn pending_items(&self) -> Vec<&MenuItem> {
        self.working_set
            .items()
            .iter()
            .filter(|item| item.has_changes())
            .collect()
    }

    /// Mirrors pending edits of `source` into `targets`.
    pub fn sync_pending_changes(&mut self, source: Scenario, targets: &[Scenario]) -> usize {
        sync::sync_pending_changes(&mut self.working_set, source, targets)
    }

    /// Creates a backup of the committed state, then prunes if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup cannot be written. Cleanup failures
    /// are logged only.
    pub fn backup(&self, description: &str) -> Result<BackupRecord> {
        let record = self
            .backups
            .create_backup(self.working_set.items(), description)?;
        if self.options.auto_cleanup
            && let Err(e) = self.backups.cleanup(self.options.retention)
        {
            warn!(error = %e, "Backup cleanup failed");
        }
        Ok(record)
    }

    /// Commits every dirty item.
    ///
    /// A backup is written first; each item then succeeds or fails on its
    /// own. Succeeded items are committed, failed items stay dirty.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backup cannot be written, in which case
    /// nothing was mutated.
    pub fn apply(&mut self) -> Result<ApplyReport> {
        let dirty = self.working_set.dirty_indices();
        if dirty.is_empty() {
            return Ok(ApplyReport::default());
        }

        self.backup(BEFORE_APPLY)
            .context("Refusing to apply changes without a backup")?;
        let report = self.engine.apply(&mut self.working_set, &dirty);
        self.notify(&report);
        Ok(report)
    }

    /// Drives the live items back to the states recorded in `record`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the pre-restore backup cannot be written.
    pub fn restore(&mut self, record: &BackupRecord) -> Result<ApplyReport> {
        self.backup(BEFORE_RESTORE)
            .context("Refusing to restore without a backup")?;
        let report = backups::restore_into(&self.engine, &mut self.working_set, record);
        info!(
            file = %record.file_path.display(),
            success = report.success_count,
            failed = report.fail_count,
            "Restored backup"
        );
        self.notify(&report);
        Ok(report)
    }

    /// Restores the rollback default recorded on the first run.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no rollback default or the pre-reset
    /// backup cannot be written.
    pub fn reset_to_default(&mut self) -> Result<ApplyReport> {
        let Some(default) = self.backups.rollback_default()? else {
            bail!(
                "No rollback default backup found in {}",
                self.backups.backups_dir().display()
            );
        };

        self.backup(BEFORE_RESET)
            .context("Refusing to reset without a backup")?;
        let report = backups::restore_into(&self.engine, &mut self.working_set, &default);
        info!(
            success = report.success_count,
            failed = report.fail_count,
            "Reset to rollback default"
        );
        self.notify(&report);
        Ok(report)
    }

    /// Rescans the store, discarding pending edits. Observers are kept.
    pub fn refresh(&mut self) {
        let items = self.scanner.scan_scenarios(&self.options.scenarios);
        self.working_set.replace(items);
    }

    fn notify(&self, report: &ApplyReport) {
        if report.success_count > 0 {
            self.notifier.associations_changed();
        }
    }
}
