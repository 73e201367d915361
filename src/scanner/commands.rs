//! Scanning of `shell` verbs.

use super::{MergeBuffer, attribution, read_subkeys, resolve_label};
use crate::model::{DisableMethod, ItemType, MenuItem, Scenario};
use crate::store::{RegistryStore, Scope, class_path, join, qualify};
use tracing::debug;

/// Value names whose presence hides a verb.
pub const DISABLE_MARKERS: [&str; 2] = ["LegacyDisable", "ProgrammaticAccessOnly"];

/// Marker written when disabling.
pub const PRIMARY_MARKER: &str = "LegacyDisable";

/// Value naming the verb label.
const LABEL_VALUE: &str = "MUIVerb";

/// Value making the verb appear only with Shift held.
const EXTENDED_VALUE: &str = "Extended";

/// Scans every `shell` root of `scenario`.
///
/// The merged view is read first, then the user-scope overrides, so a user
/// key replaces the merged-view item with the same name. A user key that
/// only carries disable markers is an overlay on the merged item and does
/// not replace it.
pub fn scan(store: &dyn RegistryStore, scenario: Scenario) -> Vec<MenuItem> {
    let mut items = Vec::new();

    for base in scenario.class_bases() {
        let merged_root = join(base, "shell");
        let mut buffer = MergeBuffer::default();

        for scope in [Scope::MergedView, Scope::UserScope] {
            let root = class_path(scope, &merged_root);
            for name in read_subkeys(store, scope, &root) {
                if scope == Scope::UserScope
                    && buffer.contains(&name)
                    && is_overlay_only(store, &class_path(scope, &join(&merged_root, &name)))
                {
                    debug!(%scenario, base, verb = %name, "User key is a disable overlay");
                    continue;
                }
                let item = read_command(store, scenario, scope, &merged_root, &name);
                buffer.upsert(&name, item);
            }
        }

        debug!(%scenario, base, count = buffer.len(), "Scanned shell verbs");
        items.extend(buffer.into_items());
    }

    items
}

/// Whether any disable marker is set for the verb at merged-view path
/// `merged_key`, either in the merged view or in the user-scope overlay.
#[must_use]
pub fn is_marked_disabled(store: &dyn RegistryStore, merged_key: &str) -> bool {
    let overlay = class_path(Scope::UserScope, merged_key);
    DISABLE_MARKERS.iter().any(|marker| {
        has_value(store, Scope::MergedView, merged_key, marker)
            || has_value(store, Scope::UserScope, &overlay, marker)
    })
}

fn has_value(store: &dyn RegistryStore, scope: Scope, path: &str, name: &str) -> bool {
    matches!(store.get_value(scope, path, name), Ok(Some(_)))
}

/// Whether the user-scope key at `key_path` holds nothing but disable
/// markers (or nothing at all).
fn is_overlay_only(store: &dyn RegistryStore, key_path: &str) -> bool {
    let has_children = store
        .subkeys(Scope::UserScope, key_path)
        .is_ok_and(|children| !children.is_empty());
    if has_children {
        return false;
    }
    store
        .values(Scope::UserScope, key_path)
        .unwrap_or_default()
        .iter()
        .all(|(name, _)| DISABLE_MARKERS.iter().any(|marker| marker.eq_ignore_ascii_case(name)))
}

fn read_command(
    store: &dyn RegistryStore,
    scenario: Scenario,
    scope: Scope,
    merged_root: &str,
    name: &str,
) -> MenuItem {
    let merged_key = join(merged_root, name);
    let key_path = class_path(scope, &merged_key);

    // Fields come from the merged view, where user values already win
    let values = store.values(Scope::MergedView, &merged_key).unwrap_or_default();
    let value = |wanted: &str| {
        values
            .iter()
            .find(|(value_name, _)| value_name.eq_ignore_ascii_case(wanted))
            .map(|(_, data)| data.as_str())
    };

    let own_marker = DISABLE_MARKERS.iter().any(|&marker| value(marker).is_some());
    let disabled = own_marker || is_marked_disabled(store, &merged_key);

    let label = value(LABEL_VALUE)
        .filter(|label| !label.trim().is_empty())
        .or_else(|| value("").filter(|label| !label.trim().is_empty()));

    let command = store
        .get_value(Scope::MergedView, &join(&merged_key, "command"), "")
        .ok()
        .flatten()
        .filter(|command| !command.is_empty());

    let mut item = MenuItem::new(
        name,
        scenario,
        ItemType::ShellCommand,
        qualify(scope, &key_path),
        scope,
        !disabled,
    );
    item.disable_method = DisableMethod::LegacyDisable;
    item.display_name = resolve_label(label, ItemType::ShellCommand, name);
    item.is_extended = value(EXTENDED_VALUE).is_some();
    item.source_name = command
        .as_deref()
        .map(attribution::source_from_command)
        .unwrap_or_default();
    item.command = command;
    item
}
