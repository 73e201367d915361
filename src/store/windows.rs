//! Native registry backend.

use super::{RegistryStore, Scope, StoreError, StoreResult};
use std::io;
use winreg::RegKey;
use winreg::enums::{HKEY_CLASSES_ROOT, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WRITE};
use winreg::types::FromRegValue;

/// The Windows registry, addressed through its three predefined roots.
#[derive(Debug, Default)]
pub struct WindowsRegistry;

impl WindowsRegistry {
    /// Creates a handle to the live registry.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn root(scope: Scope) -> RegKey {
        RegKey::predef(match scope {
            Scope::UserScope => HKEY_CURRENT_USER,
            Scope::SystemScope => HKEY_LOCAL_MACHINE,
            Scope::MergedView => HKEY_CLASSES_ROOT,
        })
    }

    fn map_err(err: io::Error, scope: Scope, path: &str) -> StoreError {
        match err.kind() {
            io::ErrorKind::PermissionDenied => StoreError::AccessDenied {
                scope,
                path: path.to_string(),
            },
            io::ErrorKind::NotFound => StoreError::NotFound {
                scope,
                path: path.to_string(),
            },
            _ => StoreError::Io(err),
        }
    }

    fn open_read(scope: Scope, path: &str) -> StoreResult<RegKey> {
        Self::root(scope)
            .open_subkey_with_flags(path, KEY_READ)
            .map_err(|e| Self::map_err(e, scope, path))
    }
}

impl RegistryStore for WindowsRegistry {
    fn key_exists(&self, scope: Scope, path: &str) -> bool {
        Self::open_read(scope, path).is_ok()
    }

    fn subkeys(&self, scope: Scope, path: &str) -> StoreResult<Vec<String>> {
        let key = Self::open_read(scope, path)?;
        // Unreadable children are skipped rather than failing the listing.
        Ok(key.enum_keys().filter_map(Result::ok).collect())
    }

    fn values(&self, scope: Scope, path: &str) -> StoreResult<Vec<(String, String)>> {
        let key = Self::open_read(scope, path)?;
        Ok(key
            .enum_values()
            .filter_map(Result::ok)
            .filter_map(|(name, raw)| String::from_reg_value(&raw).ok().map(|data| (name, data)))
            .collect())
    }

    fn get_value(&self, scope: Scope, path: &str, name: &str) -> StoreResult<Option<String>> {
        let key = match Self::open_read(scope, path) {
            Ok(key) => key,
            Err(StoreError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        match key.get_raw_value(name) {
            Ok(raw) => Ok(String::from_reg_value(&raw).ok()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::map_err(e, scope, path)),
        }
    }

    fn set_value(&self, scope: Scope, path: &str, name: &str, data: &str) -> StoreResult<()> {
        let (key, _) = Self::root(scope)
            .create_subkey_with_flags(path, KEY_WRITE)
            .map_err(|e| Self::map_err(e, scope, path))?;
        key.set_value(name, &data.to_string())
            .map_err(|e| Self::map_err(e, scope, path))
    }

    fn delete_value(&self, scope: Scope, path: &str, name: &str) -> StoreResult<()> {
        if self.get_value(scope, path, name)?.is_none() {
            return Ok(());
        }
        let key = Self::root(scope)
            .open_subkey_with_flags(path, KEY_WRITE)
            .map_err(|e| Self::map_err(e, scope, path))?;
        match key.delete_value(name) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_err(e, scope, path)),
        }
    }
}
