use crate::MenuContext;
use crate::model::{MenuItem, Scenario};
use crate::output;
use crate::storage::BackupRecord;
use crate::utils::formatters::{format_risk, format_source};
use crate::utils::plural;
use anyhow::Result;
use colored::Colorize;

/// Lists items, grouped by scenario.
///
/// With `changed`, only items whose state differs from the rollback default
/// are shown.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the backups cannot be
/// listed.
pub fn execute(ctx: &MenuContext, scenario: Option<Scenario>, changed: bool) -> Result<()> {
    let session = super::open_session(ctx)?;

    let mut items: Vec<&MenuItem> = session
        .items()
        .iter()
        .filter(|item| scenario.is_none_or(|wanted| item.scenario == wanted))
        .collect();

    if changed {
        let Some(default) = session.backups().rollback_default()? else {
            output::warning("No rollback default recorded; nothing to compare against");
            return Ok(());
        };
        items = changed_since(items, &default);
    }

    if items.is_empty() {
        output::info("No entries found");
        return Ok(());
    }

    for group in Scenario::ALL {
        let in_group: Vec<&&MenuItem> = items.iter().filter(|item| item.scenario == group).collect();
        if in_group.is_empty() {
            continue;
        }

        println!("{}", group.to_string().bold().underline());
        for item in in_group {
            println!("  {}", super::item_line(item));
            output::verbose(&format!(
                "      {} | risk {} | {}",
                format_source(item),
                format_risk(item.risk),
                item.registry_path
            ));
        }
        println!();
    }

    let disabled = items.iter().filter(|item| !item.is_enabled()).count();
    output::info(&format!(
        "{} entr{}, {disabled} disabled",
        items.len(),
        if items.len() == 1 { "y" } else { "ies" }
    ));
    let admin = items.iter().filter(|item| item.requires_admin).count();
    output::verbose(&format!(
        "{admin} machine-wide entr{} need elevation to change",
        if admin == 1 { "y" } else { "ies" }
    ));
    let backups = session.backups().list_backups()?.len();
    output::verbose(&format!("{backups} backup{} on disk", plural(backups)));
    Ok(())
}

/// Items whose current state differs from the state `record` holds for
/// them. Items the record does not know count as changed when disabled.
#[must_use]
pub fn changed_since<'a>(items: Vec<&'a MenuItem>, record: &BackupRecord) -> Vec<&'a MenuItem> {
    items
        .into_iter()
        .filter(|item| {
            let recorded = record
                .entries
                .iter()
                .find(|entry| {
                    entry.scenario == item.scenario
                        && entry.item_type == item.item_type
                        && item.matches_id(&entry.id)
                })
                .map_or(true, |entry| entry.was_enabled);
            recorded != item.is_enabled()
        })
        .collect()
}
