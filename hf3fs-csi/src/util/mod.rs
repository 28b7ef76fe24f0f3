//! Small helpers shared by the mount and node modules.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use hf3fs_csi_shared::errors::{CsiError, CsiResult};

mod advisory;
pub mod wait;

pub use advisory::Advisory;
pub use wait::{WaitError, WaitPolicy, poll_until};

/// `mkdir -p` with `mode` for every created component.
///
/// An existing directory is fine; its mode is left alone.
pub(crate) fn create_dir_with_mode(path: &Path, mode: u32) -> CsiResult<()> {
    DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)
        .map_err(|e| {
            CsiError::Storage(format!("failed to create directory {}: {}", path.display(), e))
        })
}
