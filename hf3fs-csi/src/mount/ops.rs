//! Mount-table mutations using mount(2)/umount(2).
//!
//! Requires CAP_SYS_ADMIN in the mount namespace being changed.

use std::path::Path;

use hf3fs_csi_shared::errors::{CsiError, CsiResult};
use nix::mount::{MsFlags, mount, umount};

/// Mount-table mutations used by the bind-mount manager.
pub trait MountOps: Send + Sync {
    /// Recursively bind `source` onto `target`.
    fn bind(&self, source: &Path, target: &Path) -> CsiResult<()>;

    /// Unmount whatever is mounted at `target`.
    fn unmount(&self, target: &Path) -> CsiResult<()>;

    /// Mark the mount at `path` (and everything below it) shared.
    fn make_shared(&self, path: &Path) -> CsiResult<()>;
}

/// [`MountOps`] implemented with the real syscalls.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeMountOps;

impl MountOps for NativeMountOps {
    fn bind(&self, source: &Path, target: &Path) -> CsiResult<()> {
        mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND | MsFlags::MS_REC,
            None::<&str>,
        )
        .map_err(|e| {
            CsiError::BindMount(format!(
                "failed to bind mount {} -> {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })
    }

    fn unmount(&self, target: &Path) -> CsiResult<()> {
        umount(target).map_err(|e| {
            CsiError::BindMount(format!("failed to unmount {}: {}", target.display(), e))
        })
    }

    fn make_shared(&self, path: &Path) -> CsiResult<()> {
        mount(
            None::<&str>,
            path,
            None::<&str>,
            MsFlags::MS_SHARED | MsFlags::MS_REC,
            None::<&str>,
        )
        .map_err(|e| {
            CsiError::BindMount(format!(
                "failed to set shared propagation on {}: {}",
                path.display(),
                e
            ))
        })
    }
}
