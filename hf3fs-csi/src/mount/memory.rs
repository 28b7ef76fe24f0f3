//! In-memory mount table for testing.
//!
//! Implements both [`MountTable`] and [`MountOps`] over a map of mount points,
//! so the supervisor and bind-mount manager can be exercised without
//! privileges. It does not touch the real mount table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use hf3fs_csi_shared::errors::{CsiError, CsiResult};

use super::ops::MountOps;
use super::table::MountTable;

#[derive(Debug, Clone, PartialEq, Eq)]
struct FakeMount {
    source: Option<PathBuf>,
    shared: bool,
}

/// In-memory mount table with call counters and failure injection.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use hf3fs_csi::mount::{InMemoryMountTable, MountOps, MountTable};
///
/// let table = InMemoryMountTable::new();
/// table.bind(Path::new("/mnt/c1/pvc-1"), Path::new("/target")).unwrap();
/// assert!(table.is_mount_point(Path::new("/target")).unwrap());
/// assert_eq!(table.bind_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryMountTable {
    mounts: Mutex<HashMap<PathBuf, FakeMount>>,
    binds: AtomicUsize,
    unmounts: AtomicUsize,
    make_shared_calls: AtomicUsize,
    fail_make_shared: AtomicBool,
    fail_queries: AtomicBool,
}

impl InMemoryMountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a filesystem mounted at `path`, as an external process would.
    pub fn mount(&self, path: &Path) {
        self.mounts.lock().unwrap().insert(
            path.to_path_buf(),
            FakeMount {
                source: None,
                shared: false,
            },
        );
    }

    /// Source of the bind mount at `target`, if it is one.
    pub fn bind_source(&self, target: &Path) -> Option<PathBuf> {
        self.mounts
            .lock()
            .unwrap()
            .get(target)
            .and_then(|m| m.source.clone())
    }

    pub fn set_shared(&self, path: &Path, shared: bool) {
        if let Some(m) = self.mounts.lock().unwrap().get_mut(path) {
            m.shared = shared;
        }
    }

    /// Make every subsequent [`MountOps::make_shared`] call fail.
    pub fn fail_make_shared(&self, fail: bool) {
        self.fail_make_shared.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent [`MountTable`] query fail.
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn bind_count(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    pub fn unmount_count(&self) -> usize {
        self.unmounts.load(Ordering::SeqCst)
    }

    pub fn make_shared_count(&self) -> usize {
        self.make_shared_calls.load(Ordering::SeqCst)
    }

    fn check_queries(&self) -> CsiResult<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(CsiError::MountTable("injected query failure".to_string()));
        }
        Ok(())
    }
}

impl MountTable for InMemoryMountTable {
    fn is_mount_point(&self, path: &Path) -> CsiResult<bool> {
        self.check_queries()?;
        Ok(self.mounts.lock().unwrap().contains_key(path))
    }

    fn is_shared_propagation(&self, path: &Path) -> CsiResult<bool> {
        self.check_queries()?;
        let mounts = self.mounts.lock().unwrap();
        Ok(path
            .ancestors()
            .find_map(|p| mounts.get(p))
            .is_some_and(|m| m.shared))
    }
}

impl MountOps for InMemoryMountTable {
    fn bind(&self, source: &Path, target: &Path) -> CsiResult<()> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        let mut mounts = self.mounts.lock().unwrap();
        if mounts.contains_key(target) {
            // mount(2) would stack a second mount; tests treat that as a bug
            return Err(CsiError::BindMount(format!(
                "{} is already a mount point",
                target.display()
            )));
        }
        mounts.insert(
            target.to_path_buf(),
            FakeMount {
                source: Some(source.to_path_buf()),
                shared: false,
            },
        );
        Ok(())
    }

    fn unmount(&self, target: &Path) -> CsiResult<()> {
        self.unmounts.fetch_add(1, Ordering::SeqCst);
        match self.mounts.lock().unwrap().remove(target) {
            Some(_) => Ok(()),
            None => Err(CsiError::BindMount(format!(
                "failed to unmount {}: EINVAL",
                target.display()
            ))),
        }
    }

    fn make_shared(&self, path: &Path) -> CsiResult<()> {
        self.make_shared_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_make_shared.load(Ordering::SeqCst) {
            return Err(CsiError::BindMount(format!(
                "failed to set shared propagation on {}: EPERM",
                path.display()
            )));
        }
        match self.mounts.lock().unwrap().get_mut(path) {
            Some(m) => {
                m.shared = true;
                Ok(())
            }
            None => Err(CsiError::BindMount(format!(
                "failed to set shared propagation on {}: EINVAL",
                path.display()
            ))),
        }
    }
}
