//! Starting the filesystem client process.

use std::path::Path;
use std::process::Stdio;

use hf3fs_csi_shared::errors::{CsiError, CsiResult};

/// Starts the filesystem client without waiting on it.
///
/// Readiness is observed through the mount table only, never through the
/// child's exit status or output.
pub trait ProcessLauncher: Send + Sync {
    /// Spawn `binary -cfg config_path` and return its pid.
    fn spawn(&self, binary: &Path, config_path: &Path) -> CsiResult<u32>;
}

/// [`ProcessLauncher`] that runs the real binary.
///
/// The child inherits stdout/stderr so its logs land next to the plugin's.
/// It is not killed when the handle is dropped; tokio reaps it on exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandLauncher;

impl ProcessLauncher for CommandLauncher {
    fn spawn(&self, binary: &Path, config_path: &Path) -> CsiResult<u32> {
        let child = tokio::process::Command::new(binary)
            .arg("-cfg")
            .arg(config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| {
                CsiError::Launch(format!("failed to start {}: {}", binary.display(), e))
            })?;

        child.id().ok_or_else(|| {
            CsiError::Launch(format!("{} exited before reporting a pid", binary.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_missing_binary_is_launch_error() {
        let err = CommandLauncher
            .spawn(Path::new("/nonexistent/hf3fs_fuse_main"), Path::new("/tmp/x.toml"))
            .unwrap_err();
        assert!(matches!(err, CsiError::Launch(_)), "got {err:?}");
    }
}
