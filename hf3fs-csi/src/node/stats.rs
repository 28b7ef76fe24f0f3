//! Filesystem usage of a published volume.

use std::path::Path;

use hf3fs_csi_shared::errors::{CsiError, CsiResult};
use nix::errno::Errno;
use nix::sys::statvfs::statvfs;

use super::types::{Usage, VolumeStats};

/// Query byte and inode usage of the filesystem containing `path`.
///
/// `used` is everything not available to unprivileged callers, so blocks
/// reserved for root count as used and `used + available == total`.
pub fn volume_stats(path: &Path) -> CsiResult<VolumeStats> {
    let st = statvfs(path).map_err(|e| match e {
        Errno::ENOENT => CsiError::NotFound(format!("volume path {}", path.display())),
        e => CsiError::Storage(format!("statvfs {} failed: {}", path.display(), e)),
    })?;

    Ok(VolumeStats {
        bytes: usage(
            st.blocks() as u64,
            st.blocks_available() as u64,
            st.fragment_size() as u64,
        ),
        inodes: usage(st.files() as u64, st.files_available() as u64, 1),
    })
}

fn usage(total_units: u64, available_units: u64, unit_size: u64) -> Usage {
    let total = total_units.saturating_mul(unit_size);
    let available = available_units.min(total_units).saturating_mul(unit_size);
    Usage {
        total,
        used: total - available,
        available,
    }
}
