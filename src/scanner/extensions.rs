//! Scanning of `shellex\ContextMenuHandlers` entries.

use super::{MergeBuffer, attribution, read_subkeys, resolve_label};
use crate::model::{DisableMethod, ItemSource, ItemType, MenuItem, Scenario};
use crate::store::{BLOCKED_PATH, RegistryStore, Scope, class_path, join, qualify};
use std::collections::HashSet;
use tracing::debug;

/// Handler container below a class base.
pub const HANDLERS_PATH: &str = r"shellex\ContextMenuHandlers";

/// Union of the user-scope and system-scope blocked lists, uppercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockedSet(HashSet<String>);

impl BlockedSet {
    /// Reads both blocked lists. Unreadable lists count as empty.
    #[must_use]
    pub fn load(store: &dyn RegistryStore) -> Self {
        let mut set = HashSet::new();
        for scope in [Scope::UserScope, Scope::SystemScope] {
            if let Ok(values) = store.values(scope, BLOCKED_PATH) {
                set.extend(values.into_iter().map(|(name, _)| name.to_uppercase()));
            }
        }
        Self(set)
    }

    /// Whether `clsid` is blocked in either scope.
    #[must_use]
    pub fn contains(&self, clsid: &str) -> bool {
        self.0.contains(&clsid.to_uppercase())
    }

    /// Number of blocked identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is blocked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Scans every handler root of `scenario`.
///
/// System scope is read first, then user scope, so a user handler replaces
/// the system handler with the same name.
pub fn scan(store: &dyn RegistryStore, scenario: Scenario, blocked: &BlockedSet) -> Vec<MenuItem> {
    let mut items = Vec::new();

    for base in scenario.class_bases() {
        let merged_root = join(base, HANDLERS_PATH);
        let mut buffer = MergeBuffer::default();

        for scope in [Scope::SystemScope, Scope::UserScope] {
            let root = class_path(scope, &merged_root);
            for name in read_subkeys(store, scope, &root) {
                let item = read_handler(store, scenario, scope, &root, &name, blocked);
                buffer.upsert(&name, item);
            }
        }

        debug!(%scenario, base, count = buffer.len(), "Scanned shell extensions");
        items.extend(buffer.into_items());
    }

    items
}

/// Whether `s` looks like a braced class identifier.
#[must_use]
pub fn is_clsid(s: &str) -> bool {
    let s = s.trim();
    s.len() == 38
        && s.starts_with('{')
        && s.ends_with('}')
        && s
            .get(1..37)
            .is_some_and(|body| body.chars().all(|c| c.is_ascii_hexdigit() || c == '-'))
}

fn read_handler(
    store: &dyn RegistryStore,
    scenario: Scenario,
    scope: Scope,
    root: &str,
    name: &str,
    blocked: &BlockedSet,
) -> MenuItem {
    let key_path = join(root, name);

    let default_value = store.get_value(scope, &key_path, "").ok().flatten();
    let clsid = default_value
        .as_deref()
        .map(str::trim)
        .filter(|value| is_clsid(value))
        .or_else(|| is_clsid(name).then(|| name.trim()))
        .map(str::to_uppercase);

    let class_key = clsid.as_deref().map(|clsid| join("CLSID", clsid));
    let class_name = class_key.as_deref().and_then(|class_key| {
        store
            .get_value(Scope::MergedView, class_key, "")
            .ok()
            .flatten()
            .filter(|label| !label.trim().is_empty())
    });
    let module_path = class_key.as_deref().and_then(|class_key| {
        store
            .get_value(Scope::MergedView, &join(class_key, "InprocServer32"), "")
            .ok()
            .flatten()
    });

    let is_enabled = clsid.as_deref().is_none_or(|clsid| !blocked.contains(clsid));

    let mut item = MenuItem::new(
        name,
        scenario,
        ItemType::ShellExtension,
        qualify(scope, &key_path),
        scope,
        is_enabled,
    );
    item.requires_admin = scope == Scope::SystemScope;
    item.disable_method = if clsid.is_some() {
        DisableMethod::BlockedClsid
    } else {
        DisableMethod::Unknown
    };
    item.display_name = resolve_label(class_name.as_deref(), ItemType::ShellExtension, name);

    if let Some(module) = module_path.as_deref() {
        item.source_name = attribution::source_from_path(module);
        if attribution::is_system_path(&module.to_lowercase()) {
            item.source = ItemSource::System;
        }
    }
    if clsid.is_none() {
        debug!(%scenario, handler = name, "Handler has no class identifier");
    }

    item.clsid = clsid;
    item
}
