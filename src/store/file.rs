use super::memory::{MemoryStore, StoreImage};
use super::{RegistryStore, Scope, StoreError, StoreResult};
use crate::utils::serialization;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use zstd::stream::{decode_all, encode_all};

/// Compression level used for the persisted image.
const COMPRESSION_LEVEL: i32 = 3;

/// A [`MemoryStore`] persisted to a single zstd-compressed bincode file.
///
/// Every successful write is flushed to disk before returning. The file is
/// replaced atomically so a crashed write never leaves a torn image. Writes
/// and saves are serialized, so the last image on disk is the newest one,
/// and a write whose flush fails is undone in memory as well.
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn open(path: &Path) -> Result<Self> {
        let image = if path.exists() {
            let compressed = fs::read(path)
                .with_context(|| format!("Failed to read store image: {}", path.display()))?;
            let decompressed = decode_all(&compressed[..])
                .with_context(|| format!("Failed to decompress store image: {}", path.display()))?;
            serialization::deserialize::<StoreImage>(&decompressed)
                .with_context(|| format!("Failed to decode store image: {}", path.display()))?
        } else {
            StoreImage::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            inner: MemoryStore::from_image(image),
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the image on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Access to the in-memory store, e.g. to seed keys or toggle privilege.
    ///
    /// Changes made directly through it are persisted by [`FileStore::save`].
    #[must_use]
    pub const fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    /// Writes the current image to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the atomic replace fails.
    pub fn save(&self) -> Result<()> {
        let _guard = self.lock();
        self.write_image()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_image(&self) -> Result<()> {
        let serialized = serialization::serialize(&self.inner.image())?;
        let compressed = encode_all(&serialized[..], COMPRESSION_LEVEL)?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&compressed)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to persist store image: {}", self.path.display()))?;
        Ok(())
    }

    /// Applies `change` to the in-memory store and persists it. If the
    /// image cannot be written the change is rolled back.
    fn commit(&self, change: impl FnOnce(&MemoryStore) -> StoreResult<()>) -> StoreResult<()> {
        let _guard = self.lock();
        let before = self.inner.image();
        change(&self.inner)?;

        if let Err(e) = self.write_image() {
            self.inner.replace_image(before);
            return Err(StoreError::Backend(format!("{e:#}")));
        }
        Ok(())
    }
}

impl RegistryStore for FileStore {
    fn key_exists(&self, scope: Scope, path: &str) -> bool {
        self.inner.key_exists(scope, path)
    }

    fn subkeys(&self, scope: Scope, path: &str) -> StoreResult<Vec<String>> {
        self.inner.subkeys(scope, path)
    }

    fn values(&self, scope: Scope, path: &str) -> StoreResult<Vec<(String, String)>> {
        self.inner.values(scope, path)
    }

    fn get_value(&self, scope: Scope, path: &str, name: &str) -> StoreResult<Option<String>> {
        self.inner.get_value(scope, path, name)
    }

    fn set_value(&self, scope: Scope, path: &str, name: &str, data: &str) -> StoreResult<()> {
        self.commit(|inner| inner.set_value(scope, path, name, data))
    }

    fn delete_value(&self, scope: Scope, path: &str, name: &str) -> StoreResult<()> {
        self.commit(|inner| inner.delete_value(scope, path, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_writes_survive_reopen() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("store.bin");

        let store = FileStore::open(&path)?;
        store.set_value(Scope::UserScope, r"Software\Classes\*\shell\x", "LegacyDisable", "")?;
        drop(store);

        let reopened = FileStore::open(&path)?;
        assert!(
            reopened
                .get_value(Scope::MergedView, r"*\shell\x", "LegacyDisable")?
                .is_some()
        );
        Ok(())
    }

    #[test]
    fn test_corrupt_image_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("store.bin");
        fs::write(&path, b"not zstd")?;

        assert!(FileStore::open(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_failed_flush_rolls_back_the_write() -> Result<()> {
        let dir = tempdir()?;
        // The image's parent is a regular file, so every flush fails
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"")?;
        let store = FileStore::open(&blocker.join("store.bin"))?;

        let result = store.set_value(Scope::UserScope, r"Software\Classes\*\shell\x", "LegacyDisable", "");
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert!(
            store
                .get_value(Scope::UserScope, r"Software\Classes\*\shell\x", "LegacyDisable")?
                .is_none()
        );
        Ok(())
    }

    #[test]
    fn test_concurrent_writers_persist_every_value() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("store.bin");
        let store = FileStore::open(&path)?;

        std::thread::scope(|s| {
            for scope in [Scope::UserScope, Scope::SystemScope] {
                let store = &store;
                s.spawn(move || {
                    for i in 0..20 {
                        store
                            .set_value(scope, r"Software\Classes\*\shell\x", &format!("v{i}"), "")
                            .unwrap();
                    }
                });
            }
        });

        let reopened = FileStore::open(&path)?;
        for scope in [Scope::UserScope, Scope::SystemScope] {
            let values = reopened.values(scope, r"Software\Classes\*\shell\x")?;
            assert_eq!(values.len(), 20, "{scope}");
        }
        Ok(())
    }
}
