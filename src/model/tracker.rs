use super::{ItemKey, MenuItem, Scenario};

/// Emitted whenever an item's desired state actually changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Item that changed
    pub key: ItemKey,
    /// New desired state
    pub is_enabled: bool,
    /// Whether the item is now dirty
    pub has_changes: bool,
    /// Session-wide dirty flag after this change
    pub has_unapplied_changes: bool,
}

/// Callback invoked for every [`ChangeEvent`].
pub type ChangeObserver = Box<dyn FnMut(&ChangeEvent) + Send>;

/// The in-memory working set of a reconciliation session.
///
/// Owns every scanned item. Desired-state edits go through
/// [`WorkingSet::set_enabled`] so the session-wide `has_unapplied_changes`
/// flag stays in sync and observers are notified.
#[derive(Default)]
pub struct WorkingSet {
    items: Vec<MenuItem>,
    observers: Vec<ChangeObserver>,
    has_unapplied_changes: bool,
}

impl std::fmt::Debug for WorkingSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingSet")
            .field("items", &self.items.len())
            .field("observers", &self.observers.len())
            .field("has_unapplied_changes", &self.has_unapplied_changes)
            .finish()
    }
}

impl WorkingSet {
    /// Wraps a freshly scanned item list.
    #[must_use]
    pub fn new(items: Vec<MenuItem>) -> Self {
        let mut set = Self {
            items,
            observers: Vec::new(),
            has_unapplied_changes: false,
        };
        set.recompute();
        set
    }

    /// Replaces the items (after a rescan), keeping observers.
    pub fn replace(&mut self, items: Vec<MenuItem>) {
        self.items = items;
        self.recompute();
    }

    /// Registers an observer for change events.
    pub fn subscribe(&mut self, observer: ChangeObserver) {
        self.observers.push(observer);
    }

    /// All items in scan order.
    #[must_use]
    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&MenuItem> {
        self.items.get(index)
    }

    /// Whether any item is dirty.
    #[must_use]
    pub const fn has_unapplied_changes(&self) -> bool {
        self.has_unapplied_changes
    }

    /// Index of the item with `key`.
    #[must_use]
    pub fn position(&self, key: &ItemKey) -> Option<usize> {
        self.items.iter().position(|item| &item.key() == key)
    }

    /// Indices of every item with `id` in `scenario`, in scan order.
    ///
    /// One id can live under several class bases of the same scenario, e.g.
    /// `*` and `AllFilesystemObjects` for files.
    #[must_use]
    pub fn positions_by_id(&self, scenario: Scenario, id: &str) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.scenario == scenario && item.matches_id(id))
            .map(|(index, _)| index)
            .collect()
    }

    /// Indices of every dirty item.
    #[must_use]
    pub fn dirty_indices(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.has_changes())
            .map(|(index, _)| index)
            .collect()
    }

    /// Sets the desired state of the item at `index`.
    ///
    /// Returns `false` if the index is out of range or the value is unchanged.
    pub fn set_enabled(&mut self, index: usize, value: bool) -> bool {
        let Some(item) = self.items.get_mut(index) else {
            return false;
        };
        if !item.set_enabled(value) {
            return false;
        }

        let key = item.key();
        let has_changes = item.has_changes();
        self.recompute();

        let event = ChangeEvent {
            key,
            is_enabled: value,
            has_changes,
            has_unapplied_changes: self.has_unapplied_changes,
        };
        for observer in &mut self.observers {
            observer(&event);
        }
        true
    }

    /// Marks the item at `index` as committed with its desired state.
    pub fn mark_committed(&mut self, index: usize) {
        if let Some(item) = self.items.get_mut(index) {
            item.mark_committed();
        }
        self.recompute();
    }

    /// Marks the item at `index` as committed with `value` as its state.
    pub fn force_committed(&mut self, index: usize, value: bool) {
        if let Some(item) = self.items.get_mut(index) {
            item.force_committed(value);
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        self.has_unapplied_changes = self.items.iter().any(MenuItem::has_changes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemType;
    use crate::store::Scope;
    use std::sync::{Arc, Mutex};

    fn item(id: &str, scenario: Scenario) -> MenuItem {
        MenuItem::new(
            id,
            scenario,
            ItemType::ShellCommand,
            format!(r"HKEY_CLASSES_ROOT\x\shell\{id}"),
            Scope::MergedView,
            true,
        )
    }

    #[test]
    fn test_session_flag_follows_items() {
        let mut set = WorkingSet::new(vec![item("a", Scenario::File), item("b", Scenario::File)]);
        assert!(!set.has_unapplied_changes());

        set.set_enabled(0, false);
        assert!(set.has_unapplied_changes());

        set.set_enabled(0, true);
        assert!(!set.has_unapplied_changes());
    }

    #[test]
    fn test_observers_receive_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut set = WorkingSet::new(vec![item("a", Scenario::File)]);
        set.subscribe(Box::new(move |event| {
            sink.lock().unwrap().push(event.clone());
        }));

        assert!(set.set_enabled(0, false));
        assert!(!set.set_enabled(0, false), "unchanged value emits nothing");

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].has_changes);
        assert!(events[0].has_unapplied_changes);
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let mut set = WorkingSet::new(vec![item("a", Scenario::File)]);
        assert!(!set.set_enabled(5, false));
    }

    #[test]
    fn test_lookup_by_id_is_case_insensitive() {
        let set = WorkingSet::new(vec![item("Git_Gui", Scenario::Directory)]);
        assert_eq!(set.positions_by_id(Scenario::Directory, "git_gui"), vec![0]);
        assert!(set.positions_by_id(Scenario::File, "git_gui").is_empty());
    }

    #[test]
    fn test_dirty_indices() {
        let mut set = WorkingSet::new(vec![item("a", Scenario::File), item("b", Scenario::File)]);
        set.set_enabled(1, false);
        assert_eq!(set.dirty_indices(), vec![1]);
        set.mark_committed(1);
        assert!(set.dirty_indices().is_empty());
        assert!(!set.has_unapplied_changes());
    }
}
