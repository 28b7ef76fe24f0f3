//! In-memory lock coordinator for testing.
//!
//! This implementation uses atomic flags and is NOT multiprocess-safe.
//! It should only be used for unit and integration testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use hf3fs_csi_shared::errors::CsiResult;

use super::{HeldLock, LockCoordinator, MountLockGuard};

/// In-memory lock coordinator for testing.
///
/// # Example
///
/// ```
/// use hf3fs_csi::lock::{InMemoryLockCoordinator, LockCoordinator};
///
/// let coordinator = InMemoryLockCoordinator::new();
/// let guard = coordinator.try_acquire("c1").unwrap().expect("uncontended");
/// assert!(coordinator.try_acquire("c1").unwrap().is_none());
/// drop(guard);
/// ```
#[derive(Default)]
pub struct InMemoryLockCoordinator {
    locks: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl InMemoryLockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `cluster_id` as held by some other party until the returned
    /// guard is dropped.
    pub fn hold_externally(&self, cluster_id: &str) -> MountLockGuard {
        self.try_acquire(cluster_id)
            .ok()
            .flatten()
            .expect("lock should be free before holding it externally")
    }

    /// Whether the lock for `cluster_id` is currently held.
    pub fn is_held(&self, cluster_id: &str) -> bool {
        self.locks
            .lock()
            .unwrap()
            .get(cluster_id)
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn flag(&self, cluster_id: &str) -> Arc<AtomicBool> {
        self.locks
            .lock()
            .unwrap()
            .entry(cluster_id.to_string())
            .or_default()
            .clone()
    }
}

impl LockCoordinator for InMemoryLockCoordinator {
    fn try_acquire(&self, cluster_id: &str) -> CsiResult<Option<MountLockGuard>> {
        let flag = self.flag(cluster_id);
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(None);
        }
        Ok(Some(MountLockGuard::new(
            cluster_id,
            Box::new(InMemoryLock { flag }),
        )))
    }
}

struct InMemoryLock {
    flag: Arc<AtomicBool>,
}

impl HeldLock for InMemoryLock {
    fn release(&mut self) -> CsiResult<()> {
        self.flag.store(false, Ordering::SeqCst);
        Ok(())
    }
}
