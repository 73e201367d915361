use super::{CLASSES_PREFIX, RegistryStore, Scope, StoreError, StoreResult, join};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// A single key: original-case path plus its values keyed by lowercase name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyData {
    /// Path with the casing it was created with
    pub path: String,
    /// Lowercase value name -> (original name, data)
    pub values: BTreeMap<String, (String, String)>,
}

/// Flat image of one scope: lowercase path -> key.
pub type ScopeTree = BTreeMap<String, KeyData>;

/// Serializable content of a [`MemoryStore`].
///
/// Only the two physical scopes are stored; the merged view is computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreImage {
    /// `HKEY_CURRENT_USER`
    pub user: ScopeTree,
    /// `HKEY_LOCAL_MACHINE`
    pub system: ScopeTree,
}

/// In-process store with a simulated privilege boundary.
///
/// The system scope can be made read-only to emulate a non-elevated
/// process, and writes to specific paths can be made to fail regardless of
/// scope.
pub struct MemoryStore {
    image: RwLock<StoreImage>,
    system_writable: AtomicBool,
    /// Lowercase path fragments whose writes are refused in every scope
    denied_fragments: RwLock<Vec<String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with a writable system scope.
    #[must_use]
    pub fn new() -> Self {
        Self::from_image(StoreImage::default())
    }

    /// Creates a store from a previously captured image.
    #[must_use]
    pub fn from_image(image: StoreImage) -> Self {
        Self {
            image: RwLock::new(image),
            system_writable: AtomicBool::new(true),
            denied_fragments: RwLock::new(Vec::new()),
        }
    }

    /// Captures the current content.
    #[must_use]
    pub fn image(&self) -> StoreImage {
        self.image
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the whole content, e.g. to undo a write that could not be
    /// persisted.
    pub fn replace_image(&self, image: StoreImage) {
        *self.image.write().unwrap_or_else(PoisonError::into_inner) = image;
    }

    /// Makes the system scope writable (elevated) or read-only.
    pub fn set_system_writable(&self, writable: bool) {
        self.system_writable.store(writable, Ordering::SeqCst);
    }

    /// Whether the system scope currently accepts writes.
    #[must_use]
    pub fn system_writable(&self) -> bool {
        self.system_writable.load(Ordering::SeqCst)
    }

    /// Refuses every write whose path contains `fragment` (case-insensitive).
    pub fn deny_writes_containing(&self, fragment: &str) {
        self.denied_fragments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fragment.to_lowercase());
    }

    /// Creates a key (and its ancestors) without going through permission checks.
    ///
    /// Intended for seeding fixtures; `MergedView` seeds the system scope.
    pub fn create_key(&self, scope: Scope, path: &str) {
        let (scope, path) = Self::physical(scope, path, None);
        let mut image = self.image.write().unwrap_or_else(PoisonError::into_inner);
        ensure_key(tree_mut(&mut image, scope), &path);
    }

    /// Writes a value without going through permission checks.
    ///
    /// Intended for seeding fixtures; `MergedView` seeds the system scope.
    pub fn seed_value(&self, scope: Scope, path: &str, name: &str, data: &str) {
        let (scope, path) = Self::physical(scope, path, None);
        let mut image = self.image.write().unwrap_or_else(PoisonError::into_inner);
        let key = ensure_key(tree_mut(&mut image, scope), &path);
        key.values
            .insert(name.to_lowercase(), (name.to_string(), data.to_string()));
    }

    /// Maps a scope/path pair onto a physical scope.
    ///
    /// Merged-view paths resolve to the user scope when the user scope
    /// already holds the key, otherwise to the system scope.
    fn physical(scope: Scope, path: &str, image: Option<&StoreImage>) -> (Scope, String) {
        match scope {
            Scope::UserScope | Scope::SystemScope => (scope, path.to_string()),
            Scope::MergedView => {
                let full = join(CLASSES_PREFIX, path);
                let in_user = image.is_some_and(|img| img.user.contains_key(&full.to_lowercase()));
                if in_user {
                    (Scope::UserScope, full)
                } else {
                    (Scope::SystemScope, full)
                }
            }
        }
    }

    fn check_writable(&self, scope: Scope, path: &str) -> StoreResult<()> {
        let lowered = path.to_lowercase();
        let denied = self
            .denied_fragments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|fragment| lowered.contains(fragment.as_str()));

        if denied || (scope == Scope::SystemScope && !self.system_writable()) {
            return Err(StoreError::AccessDenied {
                scope,
                path: path.to_string(),
            });
        }
        Ok(())
    }

    /// Keys visible at `scope\path`, in precedence order (lowest first).
    fn visible_keys<'a>(image: &'a StoreImage, scope: Scope, path: &str) -> Vec<&'a KeyData> {
        let lookup = |tree: &'a ScopeTree, full: &str| tree.get(&full.to_lowercase());
        match scope {
            Scope::UserScope => lookup(&image.user, path).into_iter().collect(),
            Scope::SystemScope => lookup(&image.system, path).into_iter().collect(),
            Scope::MergedView => {
                let full = join(CLASSES_PREFIX, path);
                lookup(&image.system, &full)
                    .into_iter()
                    .chain(lookup(&image.user, &full))
                    .collect()
            }
        }
    }

    fn children_of(tree: &ScopeTree, path: &str) -> Vec<String> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}\\", path.to_lowercase())
        };

        tree.range(prefix.clone()..)
            .take_while(|(lower, _)| lower.starts_with(&prefix))
            .filter(|(lower, _)| !lower[prefix.len()..].contains('\\') && lower.len() > prefix.len())
            .filter_map(|(_, key)| key.path.rsplit('\\').next().map(str::to_string))
            .collect()
    }

    fn delete_physical(&self, scope: Scope, path: &str, name: &str) -> StoreResult<()> {
        let mut image = self.image.write().unwrap_or_else(PoisonError::into_inner);
        let tree = tree_mut(&mut image, scope);
        let Some(key) = tree.get_mut(&path.to_lowercase()) else {
            return Ok(());
        };
        if !key.values.contains_key(&name.to_lowercase()) {
            return Ok(());
        }
        self.check_writable(scope, path)?;
        key.values.remove(&name.to_lowercase());
        Ok(())
    }
}

fn tree_mut(image: &mut StoreImage, scope: Scope) -> &mut ScopeTree {
    match scope {
        Scope::UserScope => &mut image.user,
        Scope::SystemScope | Scope::MergedView => &mut image.system,
    }
}

fn ensure_key<'a>(tree: &'a mut ScopeTree, path: &str) -> &'a mut KeyData {
    let segments: Vec<&str> = path.split('\\').filter(|s| !s.is_empty()).collect();
    for depth in 1..segments.len() {
        let ancestor = segments[..depth].join("\\");
        tree.entry(ancestor.to_lowercase()).or_insert_with(|| KeyData {
            path: ancestor.clone(),
            values: BTreeMap::new(),
        });
    }
    let full = segments.join("\\");
    tree.entry(full.to_lowercase()).or_insert_with(|| KeyData {
        path: full.clone(),
        values: BTreeMap::new(),
    })
}

impl RegistryStore for MemoryStore {
    fn key_exists(&self, scope: Scope, path: &str) -> bool {
        let image = self.image.read().unwrap_or_else(PoisonError::into_inner);
        !Self::visible_keys(&image, scope, path).is_empty()
    }

    fn subkeys(&self, scope: Scope, path: &str) -> StoreResult<Vec<String>> {
        let image = self.image.read().unwrap_or_else(PoisonError::into_inner);
        if Self::visible_keys(&image, scope, path).is_empty() {
            return Err(StoreError::NotFound {
                scope,
                path: path.to_string(),
            });
        }

        let mut names = match scope {
            Scope::UserScope => Self::children_of(&image.user, path),
            Scope::SystemScope => Self::children_of(&image.system, path),
            Scope::MergedView => {
                let full = join(CLASSES_PREFIX, path);
                let mut names = Self::children_of(&image.system, &full);
                names.extend(Self::children_of(&image.user, &full));
                names
            }
        };

        let mut seen = std::collections::HashSet::new();
        names.retain(|name| seen.insert(name.to_lowercase()));
        Ok(names)
    }

    fn values(&self, scope: Scope, path: &str) -> StoreResult<Vec<(String, String)>> {
        let image = self.image.read().unwrap_or_else(PoisonError::into_inner);
        let keys = Self::visible_keys(&image, scope, path);
        if keys.is_empty() {
            return Err(StoreError::NotFound {
                scope,
                path: path.to_string(),
            });
        }

        let mut merged: BTreeMap<&str, &(String, String)> = BTreeMap::new();
        for key in keys {
            for (lower, value) in &key.values {
                merged.insert(lower.as_str(), value);
            }
        }
        Ok(merged.into_values().cloned().collect())
    }

    fn get_value(&self, scope: Scope, path: &str, name: &str) -> StoreResult<Option<String>> {
        let image = self.image.read().unwrap_or_else(PoisonError::into_inner);
        let lowered = name.to_lowercase();
        Ok(Self::visible_keys(&image, scope, path)
            .into_iter()
            .rev()
            .find_map(|key| key.values.get(&lowered).map(|(_, data)| data.clone())))
    }

    fn set_value(&self, scope: Scope, path: &str, name: &str, data: &str) -> StoreResult<()> {
        let mut image = self.image.write().unwrap_or_else(PoisonError::into_inner);
        let (target, physical_path) = Self::physical(scope, path, Some(&image));
        self.check_writable(target, &physical_path)?;

        let key = ensure_key(tree_mut(&mut image, target), &physical_path);
        key.values
            .insert(name.to_lowercase(), (name.to_string(), data.to_string()));
        Ok(())
    }

    fn delete_value(&self, scope: Scope, path: &str, name: &str) -> StoreResult<()> {
        match scope {
            Scope::UserScope | Scope::SystemScope => self.delete_physical(scope, path, name),
            Scope::MergedView => {
                let full = join(CLASSES_PREFIX, path);
                let user = self.delete_physical(Scope::UserScope, &full, name);
                let system = self.delete_physical(Scope::SystemScope, &full, name);
                user.and(system)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_view_prefers_user_values() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.seed_value(Scope::SystemScope, r"Software\Classes\Directory\shell\x", "MUIVerb", "System");
        store.seed_value(Scope::UserScope, r"Software\Classes\Directory\shell\x", "MUIVerb", "User");

        let value = store.get_value(Scope::MergedView, r"Directory\shell\x", "muiverb")?;
        assert_eq!(value.as_deref(), Some("User"));
        Ok(())
    }

    #[test]
    fn test_subkeys_merge_and_dedupe() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.create_key(Scope::SystemScope, r"Software\Classes\Directory\shell\a");
        store.create_key(Scope::UserScope, r"Software\Classes\Directory\shell\A");
        store.create_key(Scope::UserScope, r"Software\Classes\Directory\shell\b");
        store.create_key(Scope::UserScope, r"Software\Classes\Directory\shell\b\command");

        let mut names = store.subkeys(Scope::MergedView, r"Directory\shell")?;
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        Ok(())
    }

    #[test]
    fn test_missing_key_is_not_found() {
        let store = MemoryStore::new();
        let err = store.subkeys(Scope::UserScope, "Nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_read_only_system_scope_denies_writes() {
        let store = MemoryStore::new();
        store.set_system_writable(false);
        let err = store
            .set_value(Scope::SystemScope, "Software\\x", "v", "")
            .unwrap_err();
        assert!(err.is_access_denied());
    }

    #[test]
    fn test_merged_write_lands_in_user_scope_when_overridden() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.set_system_writable(false);
        store.create_key(Scope::UserScope, r"Software\Classes\Directory\shell\x");

        store.set_value(Scope::MergedView, r"Directory\shell\x", "LegacyDisable", "")?;
        assert!(
            store
                .get_value(Scope::UserScope, r"Software\Classes\Directory\shell\x", "LegacyDisable")?
                .is_some()
        );
        Ok(())
    }

    #[test]
    fn test_delete_missing_value_is_ok_even_without_privilege() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.set_system_writable(false);
        store.create_key(Scope::SystemScope, r"Software\x");
        store.delete_value(Scope::SystemScope, r"Software\x", "absent")?;
        store.delete_value(Scope::SystemScope, r"Software\missing", "absent")?;
        Ok(())
    }

    #[test]
    fn test_denied_fragment_applies_to_every_scope() {
        let store = MemoryStore::new();
        store.deny_writes_containing("locked");
        assert!(
            store
                .set_value(Scope::UserScope, r"Software\Locked\x", "v", "")
                .unwrap_err()
                .is_access_denied()
        );
    }
}
