//! Per-workload bind mounts out of the shared mount.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hf3fs_csi_shared::errors::CsiResult;

use super::ops::MountOps;
use super::table::MountTable;
use crate::util::{Advisory, create_dir_with_mode};

/// Mode of the workload-facing target directory.
const TARGET_DIR_MODE: u32 = 0o755;

/// Mode of the shared-mount sub-path; workloads must be able to traverse it.
const SOURCE_DIR_MODE: u32 = 0o775;

/// Result of [`BindMountManager::publish`].
#[derive(Debug)]
pub enum PublishOutcome {
    /// The target was already a mount point; nothing was done.
    AlreadyMounted,
    /// A new bind mount was created. `propagation` reports whether marking
    /// it shared worked.
    Mounted { propagation: Advisory },
}

/// Result of [`BindMountManager::unpublish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpublishOutcome {
    /// The target was not a mount point; nothing to undo.
    NotMounted,
    Unmounted,
}

/// Creates and removes bind mounts and manages their propagation.
#[derive(Clone)]
pub struct BindMountManager {
    table: Arc<dyn MountTable>,
    ops: Arc<dyn MountOps>,
}

impl BindMountManager {
    pub fn new(table: Arc<dyn MountTable>, ops: Arc<dyn MountOps>) -> Self {
        Self { table, ops }
    }

    /// Bind `source` onto `target` unless `target` is already a mount point.
    ///
    /// Both directories are created if missing. After a new bind the target
    /// is marked shared on a best-effort basis.
    pub fn publish(&self, source: &Path, target: &Path) -> CsiResult<PublishOutcome> {
        create_dir_with_mode(target, TARGET_DIR_MODE)?;
        create_dir_with_mode(source, SOURCE_DIR_MODE)?;

        if self.table.is_mount_point(target)? {
            tracing::debug!(target = %target.display(), "Target already mounted, skipping bind");
            return Ok(PublishOutcome::AlreadyMounted);
        }

        self.ops.bind(source, target)?;
        tracing::info!(
            source = %source.display(),
            target = %target.display(),
            "Bind mount created"
        );

        let propagation = self.ensure_shared(target);
        Ok(PublishOutcome::Mounted { propagation })
    }

    /// Unmount `target` if it is a mount point.
    ///
    /// Removing the emptied directory is left to the caller.
    pub fn unpublish(&self, target: &Path) -> CsiResult<UnpublishOutcome> {
        if !self.table.is_mount_point(target)? {
            tracing::debug!(target = %target.display(), "Target not mounted, nothing to unpublish");
            return Ok(UnpublishOutcome::NotMounted);
        }

        self.ops.unmount(target)?;
        tracing::info!(target = %target.display(), "Bind mount removed");
        Ok(UnpublishOutcome::Unmounted)
    }

    /// Mark `path` shared unless it already is. Never fails the caller.
    pub fn ensure_shared(&self, path: &Path) -> Advisory {
        let result = match self.table.is_shared_propagation(path) {
            Ok(true) => Ok(()),
            Ok(false) => self.ops.make_shared(path),
            Err(e) => Err(e),
        };
        Advisory::capture("make_shared", result)
    }

    /// Mark the first workable candidate shared.
    ///
    /// Candidates are tried in order; the filesystem root and empty paths are
    /// skipped. Succeeds as soon as one candidate is (or becomes) shared.
    pub fn ensure_any_shared(&self, candidates: &[PathBuf]) -> Advisory {
        let mut last_error = None;
        for candidate in candidates {
            if candidate.as_os_str().is_empty() || candidate == Path::new("/") {
                continue;
            }
            let result = match self.table.is_shared_propagation(candidate) {
                Ok(true) => Ok(()),
                Ok(false) => self.ops.make_shared(candidate),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => return Advisory::ok("make_any_shared"),
                Err(e) => {
                    tracing::debug!(
                        path = %candidate.display(),
                        error = %e,
                        "Could not mark shared"
                    );
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Advisory::capture("make_any_shared", Err(e)),
            None => Advisory::ok("make_any_shared"),
        }
    }
}
