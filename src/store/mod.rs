//! Hierarchical key-value store abstraction.
//!
//! The reconciliation engine never talks to the registry directly. It goes
//! through [`RegistryStore`], which exposes three addressable roots
//! ([`Scope::UserScope`], [`Scope::SystemScope`] and the read-mostly
//! [`Scope::MergedView`]) and the handful of primitives the engine needs:
//! enumerate children, enumerate values, read, write (create-if-absent) and
//! delete a value.
//!
//! Backends:
//!
//! - [`memory::MemoryStore`]: in-process tree, used by tests and as the
//!   building block of the file backend
//! - [`file::FileStore`]: a `MemoryStore` persisted to disk
//! - `windows::WindowsRegistry`: the real registry (Windows only)

/// File-backed store persisted with zstd-compressed bincode.
pub mod file;
/// In-memory store with simulated privilege boundaries.
pub mod memory;
/// Native registry backend.
#[cfg(windows)]
pub mod windows;

use crate::config::Backend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Path of the class registrations relative to the user and system roots.
pub const CLASSES_PREFIX: &str = r"Software\Classes";

/// Path of the blocked shell extension list under both scoped roots.
pub const BLOCKED_PATH: &str = r"Software\Microsoft\Windows\CurrentVersion\Shell Extensions\Blocked";

/// One root of the store, each with its own access-control domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    /// Per-user root, writable without elevation.
    UserScope,
    /// Machine-wide root, writable only with elevation.
    SystemScope,
    /// Union of the `Software\Classes` branches of both scopes, user wins.
    MergedView,
}

impl Scope {
    /// All scopes in a stable order.
    pub const ALL: [Self; 3] = [Self::UserScope, Self::SystemScope, Self::MergedView];

    /// Name of the root as it appears in a fully-qualified path.
    #[must_use]
    pub const fn root_name(self) -> &'static str {
        match self {
            Self::UserScope => "HKEY_CURRENT_USER",
            Self::SystemScope => "HKEY_LOCAL_MACHINE",
            Self::MergedView => "HKEY_CLASSES_ROOT",
        }
    }

    /// Abstract label key for the localization layer.
    #[must_use]
    pub const fn label_key(self) -> &'static str {
        match self {
            Self::UserScope => "scope.user",
            Self::SystemScope => "scope.system",
            Self::MergedView => "scope.merged",
        }
    }

    /// Prefix to put in front of a merged-view relative path to address the
    /// same class key under this scope.
    #[must_use]
    pub const fn classes_prefix(self) -> Option<&'static str> {
        match self {
            Self::UserScope | Self::SystemScope => Some(CLASSES_PREFIX),
            Self::MergedView => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root_name())
    }
}

/// Errors raised by store backends.
///
/// Only `AccessDenied` is branched on by callers; the rest are reported.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The scope rejected a write for lack of privilege.
    #[error("access denied writing {scope}\\{path}")]
    AccessDenied {
        /// Scope that refused the write
        scope: Scope,
        /// Relative path that was being opened for write
        path: String,
    },

    /// The key does not exist.
    #[error("key not found: {scope}\\{path}")]
    NotFound {
        /// Scope that was searched
        scope: Scope,
        /// Relative path that is missing
        path: String,
    },

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),

    /// I/O error from a persisted backend.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error is a privilege failure that may be retried at user scope.
    #[must_use]
    pub const fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }
}

/// Result alias for store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The hierarchical store consumed by the scanner and the mutation engine.
///
/// Paths are backslash-separated and relative to the scope root. Key and
/// value names compare case-insensitively. The default value of a key has
/// the empty name.
pub trait RegistryStore: Send + Sync {
    /// Whether a key exists.
    fn key_exists(&self, scope: Scope, path: &str) -> bool;

    /// Names of the direct children of a key.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key does not exist, or a backend error.
    fn subkeys(&self, scope: Scope, path: &str) -> StoreResult<Vec<String>>;

    /// All string values of a key as `(name, data)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key does not exist, or a backend error.
    fn values(&self, scope: Scope, path: &str) -> StoreResult<Vec<(String, String)>>;

    /// A single string value, `None` if the key or the value is absent.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the key exists but cannot be read.
    fn get_value(&self, scope: Scope, path: &str, name: &str) -> StoreResult<Option<String>>;

    /// Writes a string value, creating the key (and its parents) if absent.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` if the scope is not writable.
    fn set_value(&self, scope: Scope, path: &str, name: &str, data: &str) -> StoreResult<()>;

    /// Deletes a value. Deleting a missing value or a value of a missing key
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` if the value exists and the scope is not writable.
    fn delete_value(&self, scope: Scope, path: &str, name: &str) -> StoreResult<()>;
}

/// Joins two relative store paths with a backslash.
#[must_use]
pub fn join(base: &str, child: &str) -> String {
    match (base.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}\\{}", base.trim_end_matches('\\'), child.trim_start_matches('\\')),
    }
}

/// Addresses a merged-view relative class path under `scope`.
#[must_use]
pub fn class_path(scope: Scope, merged_relative: &str) -> String {
    match scope.classes_prefix() {
        Some(prefix) => join(prefix, merged_relative),
        None => merged_relative.to_string(),
    }
}

/// Builds a fully-qualified path such as `HKEY_CLASSES_ROOT\Directory\shell\git_gui`.
#[must_use]
pub fn qualify(scope: Scope, path: &str) -> String {
    join(scope.root_name(), path)
}

/// A fully-qualified store path split into scope and relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedPath {
    /// Root the path lives under.
    pub scope: Scope,
    /// Path relative to the root.
    pub path: String,
}

impl ScopedPath {
    /// Creates a scoped path.
    #[must_use]
    pub fn new(scope: Scope, path: impl Into<String>) -> Self {
        Self {
            scope,
            path: path.into(),
        }
    }

    /// The merged-view relative class path this key corresponds to, if it is
    /// a class registration (`Software\Classes\...` under a scoped root, or
    /// anything under the merged view).
    #[must_use]
    pub fn merged_relative(&self) -> Option<&str> {
        match self.scope.classes_prefix() {
            None => Some(self.path.as_str()),
            Some(prefix) => {
                let head = self.path.get(..prefix.len())?;
                if !head.eq_ignore_ascii_case(prefix) {
                    return None;
                }
                match self.path.get(prefix.len()..)? {
                    "" => Some(""),
                    rest => rest.strip_prefix('\\'),
                }
            }
        }
    }
}

impl fmt::Display for ScopedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&qualify(self.scope, &self.path))
    }
}

impl FromStr for ScopedPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (root, rest) = s.split_once('\\').unwrap_or((s, ""));
        let scope = Scope::ALL
            .into_iter()
            .find(|scope| scope.root_name().eq_ignore_ascii_case(root))
            .ok_or_else(|| anyhow::anyhow!("Unknown store root in path: {s}"))?;
        Ok(Self::new(scope, rest))
    }
}

/// Opens the configured backend for a data directory.
///
/// `Auto` resolves to the registry on Windows and to the file store
/// (`<data_dir>/store.bin`) elsewhere.
///
/// # Errors
///
/// Returns an error if the file store cannot be read, or if the registry is
/// requested on a platform without one.
pub fn open(backend: Backend, data_dir: &Path) -> anyhow::Result<Arc<dyn RegistryStore>> {
    match backend.resolve() {
        Backend::Registry => open_registry(),
        _ => {
            let path = data_dir.join(crate::STORE_FILE);
            let store = file::FileStore::open(&path)?;
            tracing::debug!(path = %path.display(), "Opened file store");
            Ok(Arc::new(store))
        }
    }
}

#[cfg(windows)]
fn open_registry() -> anyhow::Result<Arc<dyn RegistryStore>> {
    Ok(Arc::new(windows::WindowsRegistry::new()))
}

#[cfg(not(windows))]
fn open_registry() -> anyhow::Result<Arc<dyn RegistryStore>> {
    anyhow::bail!("The registry backend is only available on Windows; set core.backend = \"file\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_handles_empty_segments() {
        assert_eq!(join("", "Directory"), "Directory");
        assert_eq!(join("Directory", ""), "Directory");
        assert_eq!(join(r"Directory\", r"\shell"), r"Directory\shell");
    }

    #[test]
    fn test_class_path_per_scope() {
        assert_eq!(class_path(Scope::MergedView, r"*\shell"), r"*\shell");
        assert_eq!(
            class_path(Scope::UserScope, r"*\shell"),
            r"Software\Classes\*\shell"
        );
    }

    #[test]
    fn test_scoped_path_round_trip() -> anyhow::Result<()> {
        let parsed: ScopedPath = r"HKEY_CURRENT_USER\Software\Classes\Directory\shell\x".parse()?;
        assert_eq!(parsed.scope, Scope::UserScope);
        assert_eq!(parsed.merged_relative(), Some(r"Directory\shell\x"));
        assert_eq!(
            parsed.to_string(),
            r"HKEY_CURRENT_USER\Software\Classes\Directory\shell\x"
        );
        Ok(())
    }

    #[test]
    fn test_scoped_path_rejects_unknown_root() {
        assert!("HKEY_USERS\\foo".parse::<ScopedPath>().is_err());
    }

    #[test]
    fn test_merged_relative_outside_classes() {
        let path = ScopedPath::new(Scope::SystemScope, BLOCKED_PATH);
        assert_eq!(path.merged_relative(), None);
        let lookalike = ScopedPath::new(Scope::UserScope, r"Software\ClassesExtra\x");
        assert_eq!(lookalike.merged_relative(), None);
    }
}
