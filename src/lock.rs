//! Cross-process session locking
//!
//! Only one process may mutate a given store at a time. Mutating commands
//! take a [`SessionLock`] on `<data_dir>/locks/<backend>.lock`; it is
//! released when dropped.

use anyhow::{Context, Result, bail};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

/// What the lock holder is doing, recorded in the lock file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOperation {
    /// Committing pending changes
    Apply,
    /// Restoring a backup
    Restore,
    /// Restoring the rollback default
    Reset,
    /// Creating or pruning backups
    Backup,
}

impl SessionOperation {
    /// Get the string representation of the operation
    const fn as_str(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Restore => "restore",
            Self::Reset => "reset",
            Self::Backup => "backup",
        }
    }
}

/// Holds an exclusive lock on one store backend
pub struct SessionLock {
    /// Lock file handle
    lock_file: File,
    /// Path to the lock file (for error messages)
    lock_path: PathBuf,
}

impl SessionLock {
    /// Acquire the lock for `backend`, waiting up to the lock timeout
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create locks directory
    /// - Another session holds the lock for longer than the timeout
    pub fn acquire(data_dir: &Path, backend: &str, operation: SessionOperation) -> Result<Self> {
        let locks_dir = data_dir.join(crate::LOCKS_DIR);
        fs::create_dir_all(&locks_dir).context("Failed to create locks directory")?;

        Self::cleanup_stale_locks(&locks_dir)?;

        let lock_path = locks_dir.join(format!("{backend}.lock"));
        let lock_file = Self::try_acquire_lock(&lock_path, operation)?;
        debug!(lock = %lock_path.display(), operation = operation.as_str(), "Acquired session lock");

        Ok(Self {
            lock_file,
            lock_path,
        })
    }

    /// Path of the held lock file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    fn try_acquire_lock(lock_path: &Path, operation: SessionOperation) -> Result<File> {
        let lock_timeout = if cfg!(test) {
            Duration::from_millis(100)
        } else {
            Duration::from_secs(10)
        };
        let retry_interval = if cfg!(test) {
            Duration::from_millis(10)
        } else {
            Duration::from_millis(100)
        };

        let start = Instant::now();

        loop {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(lock_path)
                .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;

            match file.try_lock_exclusive() {
                Ok(true) => {
                    file.set_len(0)?;
                    let mut file_ref = &file;
                    let _ = writeln!(
                        file_ref,
                        "operation={}\npid={}\ntime={}",
                        operation.as_str(),
                        std::process::id(),
                        humantime::format_rfc3339(SystemTime::now())
                    );
                    return Ok(file);
                }
                Ok(false) | Err(_) if start.elapsed() < lock_timeout => {
                    std::thread::sleep(retry_interval);
                }
                Ok(false) | Err(_) => {
                    bail!(
                        "Another ctxm session is already modifying this store. \
                         Wait for it to finish or remove the stale lock at: {}",
                        lock_path.display()
                    );
                }
            }
        }
    }

    /// Removes lock files older than five minutes left by crashed sessions
    fn cleanup_stale_locks(locks_dir: &Path) -> Result<()> {
        const STALE_THRESHOLD: Duration = Duration::from_secs(300);

        let entries = fs::read_dir(locks_dir).context("Failed to read locks directory")?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "lock") {
                continue;
            }

            if let Ok(metadata) = entry.metadata()
                && let Ok(modified) = metadata.modified()
                && let Ok(elapsed) = modified.elapsed()
                && elapsed > STALE_THRESHOLD
                && let Err(e) = fs::remove_file(&path)
            {
                warn!(lock = %path.display(), error = %e, "Failed to remove stale lock");
            }
        }

        Ok(())
    }

    /// Release the lock explicitly (normally handled by Drop)
    ///
    /// # Errors
    ///
    /// Returns an error if the unlock operation fails
    pub fn release(self) -> Result<()> {
        self.lock_file.unlock()?;
        // Drop removes the file
        Ok(())
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();

        if let Err(e) = fs::remove_file(&self.lock_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(lock = %self.lock_path.display(), error = %e, "Failed to remove lock file");
        }
    }
}
