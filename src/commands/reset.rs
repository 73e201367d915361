use crate::MenuContext;
use crate::lock::SessionOperation;
use crate::output;
use crate::utils::formatters::format_timestamp;
use anyhow::{Result, bail};

/// Restores the state recorded on the first run.
///
/// # Errors
///
/// Returns an error if there is no rollback default, the user declines, or
/// any item fails to restore.
pub fn execute(ctx: &MenuContext, yes: bool) -> Result<()> {
    let _lock = super::lock_store(ctx, SessionOperation::Reset)?;
    let mut session = super::open_session(ctx)?;

    let Some(default) = session.backups().rollback_default()? else {
        bail!("No rollback default recorded");
    };
    let question = format!(
        "Reset every entry to its state on {}?",
        format_timestamp(&default.timestamp)
    );
    if !super::confirm(ctx, &question, yes)? {
        output::info("Cancelled");
        return Ok(());
    }

    let report = session.reset_to_default()?;
    if !output::report(&report) {
        bail!("{} item(s) could not be reset", report.fail_count);
    }
    Ok(())
}
