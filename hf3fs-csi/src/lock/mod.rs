//! Cluster-scoped locking for single-flight shared-mount initialization.
//!
//! Only the holder of a cluster's mount lock may launch the filesystem
//! client. Everyone else waits for the shared mount to appear.
//!
//! Two implementations are provided:
//! - [`FileLockCoordinator`]: Cross-process locks using flock(2)
//! - [`InMemoryLockCoordinator`]: Single-process locks for testing

mod file;
mod memory;

pub use file::FileLockCoordinator;
pub use memory::InMemoryLockCoordinator;

use hf3fs_csi_shared::errors::CsiResult;

/// Hands out non-blocking exclusive locks keyed by cluster id.
///
/// Locks returned for the same cluster id must exclude each other even when
/// requested from different processes (or different plugin generations).
///
/// # Example
///
/// ```ignore
/// let coordinator = FileLockCoordinator::new("/var/lib/3fs/etc")?;
///
/// match coordinator.try_acquire("c1")? {
///     Some(guard) => {
///         // ... launch the client ...
///         drop(guard); // flock(LOCK_UN)
///     }
///     None => {
///         // someone else is initializing; wait for the mount
///     }
/// }
/// ```
pub trait LockCoordinator: Send + Sync {
    /// Try to take the mount lock for `cluster_id` without blocking.
    ///
    /// Returns `Ok(None)` if another holder owns it. That is the normal
    /// steady-state outcome, not a failure.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::Lock`](hf3fs_csi_shared::CsiError::Lock) if the
    /// lock could not be opened or attempted for any other reason.
    fn try_acquire(&self, cluster_id: &str) -> CsiResult<Option<MountLockGuard>>;
}

/// A lock that is currently held and can be released once.
pub(crate) trait HeldLock: Send {
    fn release(&mut self) -> CsiResult<()>;
}

/// RAII guard for a held mount lock.
///
/// The lock is released when the guard is dropped, including during unwinding,
/// or explicitly through [`release`](MountLockGuard::release).
#[must_use = "the mount lock is released as soon as the guard is dropped"]
pub struct MountLockGuard {
    cluster_id: String,
    lock: Box<dyn HeldLock>,
    released: bool,
}

impl MountLockGuard {
    pub(crate) fn new(cluster_id: &str, lock: Box<dyn HeldLock>) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            lock,
            released: false,
        }
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    /// Release the lock now, surfacing any error.
    pub fn release(mut self) -> CsiResult<()> {
        self.released = true;
        self.lock.release()
    }
}

impl Drop for MountLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.lock.release() {
            tracing::warn!(
                cluster_id = %self.cluster_id,
                error = %e,
                "Failed to release mount lock"
            );
        }
    }
}

impl std::fmt::Debug for MountLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountLockGuard")
            .field("cluster_id", &self.cluster_id)
            .field("released", &self.released)
            .finish()
    }
}
