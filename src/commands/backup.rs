use crate::MenuContext;
use crate::lock::SessionOperation;
use crate::output;
use crate::storage::backups::BackupManager;
use crate::utils::formatters::{format_relative_time, format_timestamp};
use crate::utils::plural;
use anyhow::{Result, bail};
use chrono::Utc;
use colored::Colorize;

/// Snapshots the committed state of every scanned item.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the backup cannot be
/// written.
pub fn create(ctx: &MenuContext, message: &str) -> Result<()> {
    let _lock = super::lock_store(ctx, SessionOperation::Backup)?;
    let session = super::open_session(ctx)?;
    let record = session.backup(message)?;
    output::success(&format!(
        "Created {} ({} entr{})",
        record.file_name(),
        record.entries.len(),
        if record.entries.len() == 1 { "y" } else { "ies" }
    ));
    Ok(())
}

/// Lists backups, newest first.
///
/// # Errors
///
/// Returns an error if the backup directory cannot be read.
pub fn list(ctx: &MenuContext) -> Result<()> {
    let manager = BackupManager::new(&ctx.data_dir);
    let records = manager.list_backups()?;
    if records.is_empty() {
        output::info("No backups");
        return Ok(());
    }

    let now = Utc::now();
    for record in &records {
        let label = if record.is_rollback_default() {
            record.description.cyan().bold().to_string()
        } else {
            record.description.clone()
        };
        println!(
            "{}  {} {}  {} ({} disabled)",
            record.file_name().yellow(),
            format_timestamp(&record.timestamp),
            format!("({})", format_relative_time(&record.timestamp, &now)).dimmed(),
            label,
            record.disabled_count()
        );
    }
    output::info(&format!(
        "{} backup{} in {}",
        records.len(),
        plural(records.len()),
        manager.backups_dir().display()
    ));
    Ok(())
}

/// Drives the live state back to a backup.
///
/// `reference` is a file name, a path, or `latest`.
///
/// # Errors
///
/// Returns an error if the backup cannot be found, the user declines, or
/// any item fails to restore.
pub fn restore(ctx: &MenuContext, reference: &str, yes: bool) -> Result<()> {
    let _lock = super::lock_store(ctx, SessionOperation::Restore)?;
    let mut session = super::open_session(ctx)?;
    let record = session.backups().resolve(reference)?;

    let question = format!(
        "Restore {} from {}?",
        record.file_name(),
        format_timestamp(&record.timestamp)
    );
    if !super::confirm(ctx, &question, yes)? {
        output::info("Cancelled");
        return Ok(());
    }

    let report = session.restore(&record)?;
    if !output::report(&report) {
        bail!("{} item(s) could not be restored", report.fail_count);
    }
    Ok(())
}

/// Deletes all but the `keep` newest backups (default `backup.retention`).
///
/// # Errors
///
/// Returns an error if `keep` is zero or a file cannot be removed.
pub fn cleanup(ctx: &MenuContext, keep: Option<usize>) -> Result<()> {
    let keep = keep.unwrap_or(ctx.config.backup.retention);
    if keep == 0 {
        bail!("Refusing to delete every backup; --keep must be at least 1");
    }

    let _lock = super::lock_store(ctx, SessionOperation::Backup)?;
    let removed = BackupManager::new(&ctx.data_dir).cleanup(keep)?;
    output::success(&format!("Removed {removed} backup{}", plural(removed)));
    Ok(())
}
