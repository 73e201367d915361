/// Backup directory management and restore
pub mod backups;

use crate::model::{DisableMethod, ItemType, MenuItem, Scenario};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Description given to the backup taken on the very first run.
pub const ROLLBACK_DEFAULT_LABEL: &str = "rollback default";

/// One item's committed identity and state inside a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    /// Item id
    pub id: String,
    /// Fully-qualified authoritative path at backup time
    pub registry_path: String,
    /// Item family
    pub item_type: ItemType,
    /// Toggle mechanism
    pub disable_method: DisableMethod,
    /// Class identifier for extensions
    #[serde(default)]
    pub clsid: Option<String>,
    /// Committed state at backup time
    pub was_enabled: bool,
    /// Scenario bucket
    pub scenario: Scenario,
}

impl From<&MenuItem> for BackupEntry {
    /// Captures the committed state; pending edits are ignored.
    fn from(item: &MenuItem) -> Self {
        Self {
            id: item.id.clone(),
            registry_path: item.registry_path.clone(),
            item_type: item.item_type,
            disable_method: item.disable_method,
            clsid: item.clsid.clone(),
            was_enabled: item.original_is_enabled(),
            scenario: item.scenario,
        }
    }
}

/// Immutable point-in-time snapshot of every item's committed state.
///
/// Serialized as a self-describing JSON document with camelCase field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Free-form label, e.g. "before apply"
    pub description: String,
    /// Where the record lives on disk; refreshed on load
    pub file_path: PathBuf,
    /// Entries in scan order
    pub entries: Vec<BackupEntry>,
}

impl BackupRecord {
    /// Whether this is the first-run rollback default.
    #[must_use]
    pub fn is_rollback_default(&self) -> bool {
        self.description == ROLLBACK_DEFAULT_LABEL
    }

    /// File name of the record, or an empty string.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Number of entries recorded as disabled.
    #[must_use]
    pub fn disabled_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.was_enabled).count()
    }
}
