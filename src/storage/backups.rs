use super::{BackupEntry, BackupRecord, ROLLBACK_DEFAULT_LABEL};
use crate::model::{ItemKey, MenuItem};
use crate::model::tracker::WorkingSet;
use crate::mutation::{ApplyReport, MutationEngine};
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prefix of every backup file name.
pub const BACKUP_PREFIX: &str = "backup_";

/// Extension of every backup file name.
pub const BACKUP_EXTENSION: &str = "json";

/// Sortable timestamp used in backup file names.
const NAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Highest collision suffix tried before giving up.
const MAX_NAME_SUFFIX: u32 = 999;

/// Creates, lists, loads and prunes backups under `<data_dir>/Backups`.
///
/// Backups are written once through a temporary file and an atomic rename,
/// so a concurrent listing either sees a complete file or none at all.
pub struct BackupManager {
    backups_dir: PathBuf,
    first_run_flag: PathBuf,
}

impl BackupManager {
    /// Creates a manager rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            backups_dir: data_dir.join(crate::BACKUPS_DIR),
            first_run_flag: data_dir.join(crate::FIRST_RUN_FLAG),
        }
    }

    /// Directory holding the backup files.
    #[must_use]
    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Snapshots the committed state of `items`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn create_backup(&self, items: &[MenuItem], description: &str) -> Result<BackupRecord> {
        fs::create_dir_all(&self.backups_dir).with_context(|| {
            format!(
                "Failed to create backup directory: {}",
                self.backups_dir.display()
            )
        })?;

        let timestamp = Utc::now();
        let mut record = BackupRecord {
            timestamp,
            description: description.to_string(),
            file_path: PathBuf::new(),
            entries: items.iter().map(BackupEntry::from).collect(),
        };

        let stem = format!(
            "{BACKUP_PREFIX}{}",
            timestamp.format(NAME_TIMESTAMP_FORMAT)
        );
        let mut tmp = tempfile::Builder::new()
            .prefix(".pending-")
            .suffix(".tmp")
            .tempfile_in(&self.backups_dir)?;

        for suffix in 0..=MAX_NAME_SUFFIX {
            let name = if suffix == 0 {
                format!("{stem}.{BACKUP_EXTENSION}")
            } else {
                format!("{stem}_{suffix:03}.{BACKUP_EXTENSION}")
            };
            record.file_path = self.backups_dir.join(name);

            let json = serde_json::to_vec_pretty(&record)?;
            let file = tmp.as_file_mut();
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&json)?;
            file.sync_all()?;

            match tmp.persist_noclobber(&record.file_path) {
                Ok(_) => {
                    info!(
                        file = %record.file_path.display(),
                        entries = record.entries.len(),
                        description,
                        "Created backup"
                    );
                    return Ok(record);
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => tmp = e.file,
                Err(e) => {
                    return Err(e.error).with_context(|| {
                        format!("Failed to write backup: {}", record.file_path.display())
                    });
                }
            }
        }

        anyhow::bail!("Too many backups created within one millisecond")
    }

    /// Reads one backup file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_backup(&self, path: &Path) -> Result<BackupRecord> {
        let content = fs::read(path)
            .with_context(|| format!("Failed to read backup: {}", path.display()))?;
        let mut record: BackupRecord = serde_json::from_slice(&content)
            .with_context(|| format!("Corrupt backup: {}", path.display()))?;
        record.file_path = path.to_path_buf();
        Ok(record)
    }

    /// All readable backups, newest first. Corrupt files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup directory exists but cannot be listed.
    pub fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        let mut records = Vec::new();
        for path in self.backup_files()? {
            match self.load_backup(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!(file = %path.display(), error = %e, "Skipping unreadable backup"),
            }
        }
        Ok(records)
    }

    /// Newest readable backup, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup directory cannot be listed.
    pub fn latest(&self) -> Result<Option<BackupRecord>> {
        Ok(self.list_backups()?.into_iter().next())
    }

    /// Resolves `latest`, a file name inside the backup directory, or a path.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing matches or the match is unreadable.
    pub fn resolve(&self, reference: &str) -> Result<BackupRecord> {
        if reference.eq_ignore_ascii_case("latest") {
            return self
                .latest()?
                .ok_or_else(|| anyhow::anyhow!("No backups found in {}", self.backups_dir.display()));
        }

        let in_dir = self.backups_dir.join(reference);
        if in_dir.is_file() {
            return self.load_backup(&in_dir);
        }
        let with_extension = self
            .backups_dir
            .join(format!("{reference}.{BACKUP_EXTENSION}"));
        if with_extension.is_file() {
            return self.load_backup(&with_extension);
        }
        let as_path = Path::new(reference);
        if as_path.is_file() {
            return self.load_backup(as_path);
        }

        anyhow::bail!("No backup found matching: {reference}")
    }

    /// Deletes all but the `keep` newest backup files. Returns the number
    /// of files removed.
    ///
    /// The rollback default is never removed and does not count towards
    /// `keep`; once pruned it could not be recorded again.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or a file cannot
    /// be removed.
    pub fn cleanup(&self, keep: usize) -> Result<usize> {
        let protected = self.rollback_default()?.map(|record| record.file_path);
        let files = self.backup_files()?;

        let mut removed = 0;
        for path in files
            .iter()
            .filter(|path| protected.as_deref() != Some(path.as_path()))
            .skip(keep)
        {
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove backup: {}", path.display()))?;
            removed += 1;
        }
        if removed > 0 {
            info!(removed, keep, "Pruned old backups");
        }
        Ok(removed)
    }

    /// Whether the first-run bootstrap has not happened yet.
    #[must_use]
    pub fn is_first_run(&self) -> bool {
        !self.first_run_flag.exists()
    }

    /// On the first run only, records the rollback default and writes the
    /// first-run flag. Later runs return `None` without touching anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup or the flag cannot be written.
    pub fn first_run_bootstrap(&self, items: &[MenuItem]) -> Result<Option<BackupRecord>> {
        if !self.is_first_run() {
            return Ok(None);
        }

        let record = self.create_backup(items, ROLLBACK_DEFAULT_LABEL)?;
        if let Some(parent) = self.first_run_flag.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.first_run_flag, Utc::now().to_rfc3339()).with_context(|| {
            format!(
                "Failed to write first-run flag: {}",
                self.first_run_flag.display()
            )
        })?;
        info!(file = %record.file_path.display(), "Recorded rollback default");
        Ok(Some(record))
    }

    /// Oldest readable backup labelled as the rollback default.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup directory cannot be listed.
    pub fn rollback_default(&self) -> Result<Option<BackupRecord>> {
        Ok(self
            .list_backups()?
            .into_iter()
            .rev()
            .find(BackupRecord::is_rollback_default))
    }

    /// Backup files, newest first by name. A missing directory is empty.
    fn backup_files(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.backups_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to list backups: {}", self.backups_dir.display())
                });
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_backup_file(path))
            .collect();
        files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(files)
    }
}

fn is_backup_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    name.starts_with(BACKUP_PREFIX)
        && path.extension().and_then(|ext| ext.to_str()) == Some(BACKUP_EXTENSION)
        && path.is_file()
}

/// Drives every item named in `record` back to its recorded state.
///
/// Entries are matched to live items by their recorded path first. Entries
/// whose path is gone fall back to `(id, scenario)` among the items no
/// other entry claimed, preferring an item of the same type. Entries
/// without a live item are skipped. Items whose committed state already
/// equals the recorded state are left alone unless they carry a pending
/// edit, which the restore overrides.
pub fn restore_into(
    engine: &MutationEngine,
    set: &mut WorkingSet,
    record: &BackupRecord,
) -> ApplyReport {
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut matches: Vec<Option<usize>> = record
        .entries
        .iter()
        .map(|entry| {
            let index = set.position(&entry_key(entry))?;
            claimed.insert(index).then_some(index)
        })
        .collect();

    for (entry, slot) in record.entries.iter().zip(matches.iter_mut()) {
        if slot.is_some() {
            continue;
        }
        let candidates: Vec<usize> = set
            .positions_by_id(entry.scenario, &entry.id)
            .into_iter()
            .filter(|index| !claimed.contains(index))
            .collect();
        let same_type = candidates.iter().copied().find(|&index| {
            set.get(index)
                .is_some_and(|item| item.item_type == entry.item_type)
        });
        *slot = same_type.or_else(|| candidates.first().copied());
        if let Some(index) = *slot {
            claimed.insert(index);
        }
    }

    let mut report = ApplyReport::default();
    let mut skipped = 0usize;
    for (entry, slot) in record.entries.iter().zip(matches) {
        let Some(index) = slot else {
            skipped += 1;
            continue;
        };
        let Some(live) = set.get(index) else {
            continue;
        };
        if live.original_is_enabled() == entry.was_enabled && !live.has_changes() {
            continue;
        }
        engine.restore_item(set, index, entry.was_enabled, &mut report);
    }

    debug!(
        file = %record.file_path.display(),
        skipped,
        restored = report.success_count,
        failed = report.fail_count,
        "Restore finished"
    );
    report
}

fn entry_key(entry: &BackupEntry) -> ItemKey {
    ItemKey {
        scenario: entry.scenario,
        item_type: entry.item_type,
        registry_path: entry.registry_path.to_lowercase(),
    }
}
