//! Mutation engine: commits enable/disable decisions to the store.
//!
//! Writes try the item's authoritative location first and fall back to a
//! user-scope overlay when the authoritative scope refuses for lack of
//! privilege. Every step reports a [`WriteOutcome`] instead of an error so
//! a batch can keep going after a single item fails.

use crate::model::tracker::WorkingSet;
use crate::model::{DisableMethod, ItemKey, MenuItem};
use crate::scanner::commands::{self, DISABLE_MARKERS, PRIMARY_MARKER};
use crate::scanner::extensions::BlockedSet;
use crate::store::{BLOCKED_PATH, RegistryStore, Scope, ScopedPath, StoreError, class_path};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Result of a single store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The store now holds the requested state; the scope that took the write.
    Written(Scope),
    /// The mutation did not take effect.
    Failed(String),
}

impl WriteOutcome {
    /// Whether the write took effect.
    #[must_use]
    pub const fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }

    fn from_store(scope: Scope, result: Result<(), StoreError>) -> Self {
        match result {
            Ok(()) => Self::Written(scope),
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

/// A mutation that failed for one item of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Identity of the failed item
    pub key: ItemKey,
    /// Item id
    pub id: String,
    /// Display name at the time of the failure
    pub display_name: String,
    /// Why the mutation failed
    pub message: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {}): {}",
            self.display_name, self.id, self.key.scenario, self.message
        )
    }
}

/// Aggregated outcome of a batch commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Items whose change took effect
    pub success_count: usize,
    /// Items whose change failed
    pub fail_count: usize,
    /// One entry per failed item
    pub failures: Vec<ItemFailure>,
}

impl ApplyReport {
    /// Whether every item succeeded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.fail_count == 0
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.success_count += other.success_count;
        self.fail_count += other.fail_count;
        self.failures.extend(other.failures);
    }

    fn record(&mut self, item: &MenuItem, outcome: &WriteOutcome) {
        match outcome {
            WriteOutcome::Written(_) => self.success_count += 1,
            WriteOutcome::Failed(message) => {
                self.fail_count += 1;
                self.failures.push(ItemFailure {
                    key: item.key(),
                    id: item.id.clone(),
                    display_name: item.display_name.clone(),
                    message: message.clone(),
                });
            }
        }
    }
}

/// One lock per scope; store writes to a scope happen inside its lock.
#[derive(Default)]
struct ScopeLocks {
    user: Mutex<()>,
    system: Mutex<()>,
    merged: Mutex<()>,
}

impl ScopeLocks {
    fn lock(&self, scope: Scope) -> MutexGuard<'_, ()> {
        let mutex = match scope {
            Scope::UserScope => &self.user,
            Scope::SystemScope => &self.system,
            Scope::MergedView => &self.merged,
        };
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Applies enable/disable to the store.
pub struct MutationEngine {
    store: Arc<dyn RegistryStore>,
    locks: ScopeLocks,
}

impl MutationEngine {
    /// Creates an engine writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            store,
            locks: ScopeLocks::default(),
        }
    }

    /// Makes the item visible. Idempotent.
    #[must_use]
    pub fn enable(&self, item: &MenuItem) -> WriteOutcome {
        let outcome = match item.disable_method {
            DisableMethod::LegacyDisable => self.clear_markers(item),
            DisableMethod::BlockedClsid => self.unblock(item),
            DisableMethod::Unknown => not_toggleable(item),
        };
        log_outcome(item, "enable", &outcome);
        outcome
    }

    /// Hides the item. Idempotent.
    #[must_use]
    pub fn disable(&self, item: &MenuItem) -> WriteOutcome {
        let outcome = match item.disable_method {
            DisableMethod::LegacyDisable => self.write_marker(item),
            DisableMethod::BlockedClsid => self.block(item),
            DisableMethod::Unknown => not_toggleable(item),
        };
        log_outcome(item, "disable", &outcome);
        outcome
    }

    /// Enables or disables the item.
    #[must_use]
    pub fn set_state(&self, item: &MenuItem, enabled: bool) -> WriteOutcome {
        if enabled {
            self.enable(item)
        } else {
            self.disable(item)
        }
    }

    /// Commits the dirty items at `indices`.
    ///
    /// Each item is independent: a failure is recorded and the batch goes on.
    /// Items that succeed are marked committed; failed items stay dirty.
    pub fn apply(&self, set: &mut WorkingSet, indices: &[usize]) -> ApplyReport {
        let mut report = ApplyReport::default();

        for &index in indices {
            let Some(item) = set.get(index).cloned() else {
                continue;
            };
            let outcome = self.set_state(&item, item.is_enabled());
            if outcome.is_written() {
                set.mark_committed(index);
            }
            report.record(&item, &outcome);
        }

        info!(
            success = report.success_count,
            failed = report.fail_count,
            "Applied pending changes"
        );
        report
    }

    /// Drives the item at `index` to `enabled` and records it as committed.
    ///
    /// Used by restore, which works from the committed state rather than
    /// the desired state.
    pub(crate) fn restore_item(
        &self,
        set: &mut WorkingSet,
        index: usize,
        enabled: bool,
        report: &mut ApplyReport,
    ) {
        let Some(item) = set.get(index).cloned() else {
            return;
        };
        let outcome = self.set_state(&item, enabled);
        if outcome.is_written() {
            set.force_committed(index, enabled);
        }
        report.record(&item, &outcome);
    }

    /// First step of a privileged write: the item's own location.
    ///
    /// # Errors
    ///
    /// Returns the store error, `AccessDenied` included, unchanged.
    pub fn try_write_authoritative(
        &self,
        target: &ScopedPath,
        name: &str,
        data: &str,
    ) -> Result<Scope, StoreError> {
        let _guard = self.locks.lock(target.scope);
        self.store
            .set_value(target.scope, &target.path, name, data)
            .map(|()| target.scope)
    }

    /// Second step of a privileged write: the user-scope overlay.
    #[must_use]
    pub fn write_overlay(&self, overlay_path: &str, name: &str, data: &str) -> WriteOutcome {
        let _guard = self.locks.lock(Scope::UserScope);
        WriteOutcome::from_store(
            Scope::UserScope,
            self.store
                .set_value(Scope::UserScope, overlay_path, name, data),
        )
    }

    fn delete(&self, scope: Scope, path: &str, name: &str) -> Result<(), StoreError> {
        let _guard = self.locks.lock(scope);
        self.store.delete_value(scope, path, name)
    }

    fn write_with_fallback(
        &self,
        target: &ScopedPath,
        overlay_path: &str,
        name: &str,
        data: &str,
    ) -> WriteOutcome {
        match self.try_write_authoritative(target, name, data) {
            Ok(scope) => WriteOutcome::Written(scope),
            Err(e) if e.is_access_denied() => {
                debug!(target = %target, "Authoritative write denied, writing user overlay");
                self.write_overlay(overlay_path, name, data)
            }
            Err(e) => WriteOutcome::Failed(e.to_string()),
        }
    }

    fn write_marker(&self, item: &MenuItem) -> WriteOutcome {
        let (target, merged_key) = match command_paths(item) {
            Ok(paths) => paths,
            Err(outcome) => return outcome,
        };
        let overlay = class_path(Scope::UserScope, &merged_key);
        self.write_with_fallback(&target, &overlay, PRIMARY_MARKER, "")
    }

    fn clear_markers(&self, item: &MenuItem) -> WriteOutcome {
        let (target, merged_key) = match command_paths(item) {
            Ok(paths) => paths,
            Err(outcome) => return outcome,
        };
        let overlay = class_path(Scope::UserScope, &merged_key);

        let mut errors = Vec::new();
        for marker in DISABLE_MARKERS {
            let attempts = [
                (target.scope, target.path.as_str()),
                (Scope::MergedView, merged_key.as_str()),
                (Scope::UserScope, overlay.as_str()),
            ];
            for (scope, path) in attempts {
                if let Err(e) = self.delete(scope, path, marker) {
                    warn!(%scope, path, marker, error = %e, "Could not clear disable marker");
                    errors.push(e.to_string());
                }
            }
        }

        if commands::is_marked_disabled(self.store.as_ref(), &merged_key) {
            let reason = errors
                .into_iter()
                .next()
                .unwrap_or_else(|| "disable marker is still present".to_string());
            return WriteOutcome::Failed(reason);
        }
        WriteOutcome::Written(target.scope)
    }

    fn block(&self, item: &MenuItem) -> WriteOutcome {
        let Some(clsid) = item.clsid.as_deref() else {
            return WriteOutcome::Failed(format!("{} has no class identifier", item.id));
        };
        let target = ScopedPath::new(Scope::SystemScope, BLOCKED_PATH);
        self.write_with_fallback(&target, BLOCKED_PATH, clsid, &item.display_name)
    }

    fn unblock(&self, item: &MenuItem) -> WriteOutcome {
        let Some(clsid) = item.clsid.as_deref() else {
            return WriteOutcome::Failed(format!("{} has no class identifier", item.id));
        };

        let mut errors = Vec::new();
        let mut cleared_system = false;
        for scope in [Scope::UserScope, Scope::SystemScope] {
            let listed = matches!(self.store.get_value(scope, BLOCKED_PATH, clsid), Ok(Some(_)));
            match self.delete(scope, BLOCKED_PATH, clsid) {
                Ok(()) => cleared_system |= listed && scope == Scope::SystemScope,
                Err(e) => {
                    warn!(%scope, clsid, error = %e, "Could not remove blocked entry");
                    errors.push(e.to_string());
                }
            }
        }

        if BlockedSet::load(self.store.as_ref()).contains(clsid) {
            let reason = errors
                .into_iter()
                .next()
                .unwrap_or_else(|| format!("{clsid} is still blocked"));
            return WriteOutcome::Failed(reason);
        }
        // The per-user list needs no elevation, so it is the scope reported
        // unless a machine-wide entry had to go
        WriteOutcome::Written(if cleared_system {
            Scope::SystemScope
        } else {
            Scope::UserScope
        })
    }
}

/// Authoritative path and merged-view relative path of a command item.
fn command_paths(item: &MenuItem) -> Result<(ScopedPath, String), WriteOutcome> {
    let target: ScopedPath = item
        .registry_path
        .parse()
        .map_err(|e: anyhow::Error| WriteOutcome::Failed(e.to_string()))?;
    let merged_key = target
        .merged_relative()
        .map(str::to_string)
        .ok_or_else(|| {
            WriteOutcome::Failed(format!("{} is not a class registration", item.registry_path))
        })?;
    Ok((target, merged_key))
}

fn not_toggleable(item: &MenuItem) -> WriteOutcome {
    WriteOutcome::Failed(format!("{} cannot be toggled", item.id))
}

fn log_outcome(item: &MenuItem, action: &str, outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Written(scope) => {
            debug!(id = %item.id, scenario = %item.scenario, action, %scope, "Mutation written");
        }
        WriteOutcome::Failed(reason) => {
            warn!(id = %item.id, scenario = %item.scenario, action, reason, "Mutation failed");
        }
    }
}
