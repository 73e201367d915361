//! Namespace scanner.
//!
//! Enumerates the scoped roots of each [`Scenario`], merges overlapping
//! entries by scope precedence and classifies every entry into a
//! [`MenuItem`].
//!
//! Read failures never abort a scan: an unreadable or missing branch is
//! treated as having no entries.

/// Vendor attribution heuristics.
pub mod attribution;
/// `shell` verb scanning.
pub mod commands;
/// `shellex` handler scanning.
pub mod extensions;

use crate::catalog;
use crate::model::{ItemKey, ItemType, MenuItem, RiskLevel, Scenario};
use crate::store::{RegistryStore, Scope, StoreError};
use extensions::BlockedSet;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{Level, debug, span, warn};

/// Prefix marking an indirect resource reference such as `@shell32.dll,-8506`.
pub const RESOURCE_SIGIL: char = '@';

/// Description given to unknown items that only show with Shift held.
pub const EXTENDED_DESCRIPTION: &str = "Shown only when Shift is held while right-clicking.";

/// Scans a store into menu items.
#[derive(Clone)]
pub struct NamespaceScanner {
    store: Arc<dyn RegistryStore>,
}

impl NamespaceScanner {
    /// Creates a scanner over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    /// Scans commands and extensions of one scenario.
    #[must_use]
    pub fn scan(&self, scenario: Scenario) -> Vec<MenuItem> {
        let blocked = BlockedSet::load(self.store.as_ref());
        self.scan_with(scenario, &blocked)
    }

    /// Scans every scenario.
    #[must_use]
    pub fn scan_all(&self) -> Vec<MenuItem> {
        self.scan_scenarios(&Scenario::ALL)
    }

    /// Scans the given scenarios in parallel. Results keep the order of
    /// `scenarios`.
    #[must_use]
    pub fn scan_scenarios(&self, scenarios: &[Scenario]) -> Vec<MenuItem> {
        let span = span!(Level::DEBUG, "scan_all", scenarios = scenarios.len());
        let _guard = span.enter();

        let blocked = BlockedSet::load(self.store.as_ref());
        debug!(blocked = blocked.len(), "Loaded blocked class identifiers");

        let per_scenario: Vec<Vec<MenuItem>> = scenarios
            .par_iter()
            .map(|scenario| self.scan_with(*scenario, &blocked))
            .collect();

        per_scenario.into_iter().flatten().collect()
    }

    fn scan_with(&self, scenario: Scenario, blocked: &BlockedSet) -> Vec<MenuItem> {
        let store = self.store.as_ref();
        let mut items = commands::scan(store, scenario);
        items.extend(extensions::scan(store, scenario, blocked));

        for item in &mut items {
            apply_known_identity(item);
        }

        let items = dedup(items);
        debug!(%scenario, count = items.len(), "Scenario scan complete");
        items
    }
}

/// Drops items whose `(scenario, item_type, registry_path)` was already
/// seen. The first occurrence wins.
#[must_use]
pub fn dedup(items: Vec<MenuItem>) -> Vec<MenuItem> {
    let mut seen: HashSet<ItemKey> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.key()))
        .collect()
}

/// Finalizes name, description, risk and source from the known-identity
/// table, or applies defaults for unknown items.
pub fn apply_known_identity(item: &mut MenuItem) {
    if let Some(known) = catalog::lookup(item.item_type, &item.id) {
        item.display_name = known.display_name.to_string();
        item.description = known.description.to_string();
        item.risk = known.risk;
        item.source = known.source;
        item.source_name = known.vendor.to_string();
        return;
    }

    item.risk = RiskLevel::Low;
    item.description = if item.is_extended {
        EXTENDED_DESCRIPTION.to_string()
    } else {
        String::new()
    };
}

/// Resolves a display label with the resource-reference fallback rule.
///
/// `label` is the first non-empty candidate read from the store. A missing
/// or unresolved (`@...`) label falls back to the known-identity table, then
/// to the raw key name. Menu accelerators (`&`) are stripped.
#[must_use]
pub fn resolve_label(label: Option<&str>, item_type: ItemType, raw_name: &str) -> String {
    match label.map(str::trim) {
        Some(label) if !label.is_empty() && !label.starts_with(RESOURCE_SIGIL) => {
            strip_accelerator(label)
        }
        _ => catalog::lookup(item_type, raw_name)
            .map_or_else(|| raw_name.to_string(), |known| known.display_name.to_string()),
    }
}

/// Removes single `&` accelerator markers, keeping escaped `&&` as `&`.
fn strip_accelerator(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut chars = label.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&' {
            if chars.peek() == Some(&'&') {
                out.push('&');
                chars.next();
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Lists children of a key, treating any failure as "no entries".
fn read_subkeys(store: &dyn RegistryStore, scope: Scope, path: &str) -> Vec<String> {
    match store.subkeys(scope, path) {
        Ok(names) => names,
        Err(StoreError::NotFound { .. }) => Vec::new(),
        Err(e) => {
            warn!(%scope, path, error = %e, "Skipping unreadable branch");
            Vec::new()
        }
    }
}

/// Insertion-ordered map keyed by case-insensitive name where a later
/// insert replaces the earlier item in place.
#[derive(Default)]
struct MergeBuffer {
    positions: HashMap<String, usize>,
    items: Vec<MenuItem>,
}

impl MergeBuffer {
    fn upsert(&mut self, name: &str, item: MenuItem) {
        match self.positions.get(&name.to_lowercase()) {
            Some(&index) => self.items[index] = item,
            None => {
                self.positions.insert(name.to_lowercase(), self.items.len());
                self.items.push(item);
            }
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(&name.to_lowercase())
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn into_items(self) -> Vec<MenuItem> {
        self.items
    }
}
