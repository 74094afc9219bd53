//! Exclusive, per-catalog write lock.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use fs2::FileExt;

use crate::error::Error;

/// Holds an exclusive advisory lock on a lock file for as long as it lives.
///
/// ```rust,no_run
/// use msgforge::lock::TargetLock;
///
/// // Blocks until no other writer holds the lock
/// let guard = TargetLock::acquire("resources/gettext/es/LC_MESSAGES/messages.lock")?;
/// // ... write catalog files ...
/// drop(guard);
/// # Ok::<(), msgforge::Error>(())
/// ```
#[derive(Debug)]
pub struct TargetLock {
    file: File,
    path: PathBuf,
}

impl TargetLock {
    /// Creates the lock file if needed and blocks until the lock is acquired.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;
        tracing::debug!(path = %path.display(), "acquired catalog lock");
        Ok(TargetLock { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        // The lock file stays on disk; waiters must lock the same inode.
        let _ = FileExt::unlock(&self.file);
    }
}
