//! File-based lock coordinator for cross-process locking.
//!
//! Uses flock(2) on a per-cluster lock file. The lock file itself is never
//! removed; its existence carries no meaning, only the flock state does.

use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use hf3fs_csi_shared::errors::{CsiError, CsiResult};

use super::{HeldLock, LockCoordinator, MountLockGuard};

/// File-based lock coordinator.
///
/// # Directory Structure
///
/// ```text
/// config_dir/
/// ├── c1.mount.lock     # Lock file for cluster "c1"
/// ├── c2.mount.lock
/// └── hf3fs_fuse_main_launcher.toml
/// ```
pub struct FileLockCoordinator {
    lock_dir: PathBuf,
}

impl FileLockCoordinator {
    /// Create a coordinator that keeps lock files in `lock_dir`.
    ///
    /// The directory will be created if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(lock_dir: P) -> CsiResult<Self> {
        let lock_dir = lock_dir.as_ref().to_path_buf();

        fs::create_dir_all(&lock_dir).map_err(|e| {
            CsiError::Lock(format!(
                "failed to create lock directory {}: {}",
                lock_dir.display(),
                e
            ))
        })?;

        Ok(Self { lock_dir })
    }

    /// Get the path to a cluster's lock file.
    pub fn lock_path(&self, cluster_id: &str) -> PathBuf {
        self.lock_dir.join(format!("{}.mount.lock", cluster_id))
    }
}

impl LockCoordinator for FileLockCoordinator {
    fn try_acquire(&self, cluster_id: &str) -> CsiResult<Option<MountLockGuard>> {
        let path = self.lock_path(cluster_id);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o644)
            .open(&path)
            .map_err(|e| {
                CsiError::Lock(format!("failed to open lock file {}: {}", path.display(), e))
            })?;

        let fd = file.as_raw_fd();
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result != 0 {
            let err = std::io::Error::last_os_error();
            // File is closed on drop either way
            if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                tracing::debug!(lock = %path.display(), "Mount lock held elsewhere");
                return Ok(None);
            }
            return Err(CsiError::Lock(format!(
                "flock(LOCK_EX) on {} failed: {}",
                path.display(),
                err
            )));
        }

        tracing::debug!(lock = %path.display(), "Acquired mount lock");
        Ok(Some(MountLockGuard::new(
            cluster_id,
            Box::new(FileLock {
                path,
                file: Some(file),
            }),
        )))
    }
}

/// A held flock(2) lock.
struct FileLock {
    path: PathBuf,
    file: Option<File>,
}

impl HeldLock for FileLock {
    fn release(&mut self) -> CsiResult<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        // Closing the descriptor drops the lock even if LOCK_UN failed
        drop(file);
        if result != 0 {
            return Err(CsiError::Lock(format!(
                "flock(LOCK_UN) on {} failed: {}",
                self.path.display(),
                std::io::Error::last_os_error()
            )));
        }

        tracing::debug!(lock = %self.path.display(), "Released mount lock");
        Ok(())
    }
}
