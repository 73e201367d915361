use crate::MenuContext;
use crate::cli::ToggleTarget;
use crate::lock::SessionOperation;
use crate::model::{MenuItem, Scenario};
use crate::output;
use crate::session::Session;
use anyhow::{Result, bail};

/// Enables or disables the entries with `id` and commits the change.
///
/// # Errors
///
/// Returns an error if:
/// - No entry matches `id`, or it matches in several scenarios without
///   `--scenario` or `--all-scenarios`
/// - The entry cannot be toggled
/// - The user declines the machine-wide confirmation
/// - Any item fails to commit
pub fn execute(ctx: &MenuContext, id: &str, target: &ToggleTarget, enable: bool) -> Result<()> {
    let _lock = super::lock_store(ctx, SessionOperation::Apply)?;
    let mut session = super::open_session(ctx)?;

    for scenario in select_scenarios(session.items(), id, target)? {
        if session.set_enabled_by_id(scenario, id, enable)? {
            output::verbose(&format!("Marked '{id}' in {scenario}"));
        }
    }

    let state = if enable { "enabled" } else { "disabled" };
    if !session.has_unapplied_changes() {
        output::info(&format!("'{id}' is already {state}"));
        return Ok(());
    }

    if !confirm_admin(ctx, &session, target.yes)? {
        output::info("Cancelled");
        return Ok(());
    }

    let report = session.apply()?;
    if !output::report(&report) {
        bail!("{} change(s) could not be applied", report.fail_count);
    }
    output::action(if enable { "Enabled" } else { "Disabled" }, id);
    Ok(())
}

/// Scenarios to change, the source scenario first.
///
/// # Errors
///
/// Returns an error if nothing matches or the match is ambiguous.
pub fn select_scenarios(items: &[MenuItem], id: &str, target: &ToggleTarget) -> Result<Vec<Scenario>> {
    let mut found: Vec<Scenario> = Vec::new();
    for item in items.iter().filter(|item| item.matches_id(id)) {
        if !found.contains(&item.scenario) {
            found.push(item.scenario);
        }
    }

    if let Some(wanted) = target.scenario {
        if !found.contains(&wanted) {
            bail!("No entry '{id}' in scenario {wanted}");
        }
        if target.all_scenarios {
            found.retain(|scenario| *scenario != wanted);
            found.insert(0, wanted);
            return Ok(found);
        }
        return Ok(vec![wanted]);
    }

    match found.len() {
        0 => bail!("No entry '{id}' found"),
        1 => Ok(found),
        _ if target.all_scenarios => Ok(found),
        _ => {
            let names: Vec<String> = found.iter().map(ToString::to_string).collect();
            bail!(
                "'{id}' exists in several scenarios ({}); pass --scenario or --all-scenarios",
                names.join(", ")
            )
        }
    }
}

fn confirm_admin(ctx: &MenuContext, session: &Session, assume_yes: bool) -> Result<bool> {
    let admin = session.pending_admin_items();
    if admin.is_empty() {
        return Ok(true);
    }
    super::print_admin_items(&admin);
    super::confirm(ctx, "Change machine-wide entries?", assume_yes)
}
