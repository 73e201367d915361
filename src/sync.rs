use crate::model::tracker::WorkingSet;
use crate::model::{ItemType, Scenario};
use tracing::debug;

/// Mirrors the pending edits of `source` into `targets`.
///
/// For every dirty item in `source`, each item in a target scenario with the
/// same `(item_type, id)` and a different desired state is flipped to match.
/// Only the in-memory desired state changes; flipped items become dirty and
/// are written by the next commit.
///
/// Returns the number of target items changed. `source` itself is ignored
/// if it appears in `targets`.
pub fn sync_pending_changes(set: &mut WorkingSet, source: Scenario, targets: &[Scenario]) -> usize {
    let pending: Vec<(ItemType, String, bool)> = set
        .items()
        .iter()
        .filter(|item| item.scenario == source && item.has_changes())
        .map(|item| (item.item_type, item.id.clone(), item.is_enabled()))
        .collect();

    if pending.is_empty() {
        return 0;
    }

    let to_flip: Vec<(usize, bool)> = set
        .items()
        .iter()
        .enumerate()
        .filter(|(_, item)| item.scenario != source && targets.contains(&item.scenario))
        .filter_map(|(index, item)| {
            pending
                .iter()
                .find(|(item_type, id, _)| item.item_type == *item_type && item.matches_id(id))
                .filter(|(_, _, enabled)| item.is_enabled() != *enabled)
                .map(|(_, _, enabled)| (index, *enabled))
        })
        .collect();

    let changed = to_flip
        .into_iter()
        .filter(|&(index, enabled)| set.set_enabled(index, enabled))
        .count();

    debug!(%source, targets = targets.len(), changed, "Synced pending changes");
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MenuItem;
    use crate::store::Scope;

    fn item(id: &str, scenario: Scenario, item_type: ItemType, enabled: bool) -> MenuItem {
        MenuItem::new(
            id,
            scenario,
            item_type,
            format!(r"HKEY_CLASSES_ROOT\{scenario}\{id}"),
            Scope::MergedView,
            enabled,
        )
    }

    #[test]
    fn test_fan_out_marks_targets_dirty() {
        let mut set = WorkingSet::new(vec![
            item("x", Scenario::File, ItemType::ShellCommand, true),
            item("X", Scenario::Directory, ItemType::ShellCommand, true),
            item("x", Scenario::DesktopBackground, ItemType::ShellCommand, true),
        ]);
        set.set_enabled(0, false);

        let changed = sync_pending_changes(&mut set, Scenario::File, &[Scenario::Directory]);
        assert_eq!(changed, 1);
        assert!(!set.items()[1].is_enabled());
        assert!(set.items()[1].has_changes());
        assert!(set.items()[2].is_enabled(), "scenario not targeted");
    }

    #[test]
    fn test_type_must_match() {
        let mut set = WorkingSet::new(vec![
            item("x", Scenario::File, ItemType::ShellCommand, true),
            item("x", Scenario::Directory, ItemType::ShellExtension, true),
        ]);
        set.set_enabled(0, false);

        assert_eq!(sync_pending_changes(&mut set, Scenario::File, &Scenario::ALL), 0);
    }

    #[test]
    fn test_already_matching_target_is_not_counted() {
        let mut set = WorkingSet::new(vec![
            item("x", Scenario::File, ItemType::ShellCommand, true),
            item("x", Scenario::Directory, ItemType::ShellCommand, false),
        ]);
        set.set_enabled(0, false);

        assert_eq!(sync_pending_changes(&mut set, Scenario::File, &[Scenario::Directory]), 0);
        assert!(!set.items()[1].has_changes());
    }

    #[test]
    fn test_committed_source_items_are_not_propagated() {
        let mut set = WorkingSet::new(vec![
            item("x", Scenario::File, ItemType::ShellCommand, false),
            item("x", Scenario::Directory, ItemType::ShellCommand, true),
        ]);

        assert_eq!(sync_pending_changes(&mut set, Scenario::File, &[Scenario::Directory]), 0);
    }
}
