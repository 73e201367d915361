pub mod backup;
pub mod config;
pub mod list;
pub mod reset;
pub mod toggle;

use crate::MenuContext;
use crate::lock::{SessionLock, SessionOperation};
use crate::model::MenuItem;
use crate::notify::LogNotifier;
use crate::output;
use crate::session::Session;
use crate::utils::formatters::{format_state, scope_tag, truncate_with_ellipsis};
use anyhow::{Result, bail};
use colored::Colorize;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

/// Widest display name printed before truncation.
const NAME_WIDTH: usize = 40;

/// Opens a session over the configured backend and surfaces its status
/// messages as warnings.
///
/// # Errors
///
/// Returns an error if the data directory or the store cannot be opened.
pub fn open_session(ctx: &MenuContext) -> Result<Session> {
    ctx.ensure_data_dir()?;
    let store = crate::store::open(ctx.config.core.backend, &ctx.data_dir)?;
    let session = Session::open(ctx, store, Arc::new(LogNotifier));
    for message in session.status_messages() {
        output::warning(message);
    }
    Ok(session)
}

/// Takes the cross-process lock for the configured backend.
///
/// # Errors
///
/// Returns an error if another session holds the lock.
pub fn lock_store(ctx: &MenuContext, operation: SessionOperation) -> Result<SessionLock> {
    ctx.ensure_data_dir()?;
    SessionLock::acquire(
        &ctx.data_dir,
        ctx.config.core.backend.resolve().as_str(),
        operation,
    )
}

/// Asks a yes/no question on the terminal.
///
/// `assume_yes` answers without asking. Without a terminal, or in a
/// non-interactive context, the question cannot be asked and an error tells
/// the user to pass `--yes`.
///
/// # Errors
///
/// Returns an error if confirmation is needed but cannot be asked, or the
/// terminal cannot be read.
pub fn confirm(ctx: &MenuContext, question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if ctx.non_interactive || !io::stdin().is_terminal() {
        bail!("{question} Re-run with --yes to confirm");
    }

    print!("{question} [y/N]: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let answer = input.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

/// One listing line: state, id, name and where the item lives.
#[must_use]
pub fn item_line(item: &MenuItem) -> String {
    format!(
        "{} {:<24} {:<width$} {}",
        format_state(item),
        item.id.bold(),
        truncate_with_ellipsis(&item.display_name, NAME_WIDTH),
        format!("[{} {}]", item.item_type, scope_tag(item.registry_scope)).dimmed(),
        width = NAME_WIDTH,
    )
}

/// Prints the items that need elevation to commit.
pub fn print_admin_items(items: &[&MenuItem]) {
    output::warning(&format!(
        "{} machine-wide entr{} will be changed:",
        items.len(),
        if items.len() == 1 { "y" } else { "ies" }
    ));
    for item in items {
        eprintln!("  {} ({})", item.display_name, item.scenario);
    }
}
