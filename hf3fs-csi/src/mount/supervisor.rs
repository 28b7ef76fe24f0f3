//! Filesystem client supervision.
//!
//! Guarantees that the cluster's shared mount exists before any bind mount
//! is made from it. Initialization is single-flight across processes:
//!
//! ```text
//! Uninitialized ─┬─ lock held ───► LockHeld ─► ConfigWritten ─► ProcessStarted ─┐
//!                │                    │ (already mounted)                        ├─► MountReady
//!                └─ lock not held ─► LockNotHeld ─► WaitingForMount ─────────────┘
//!                                                        │
//!                                         TimedOut / LaunchFailed / Cancelled
//! ```
//!
//! Whoever holds the mount lock launches the client and keeps the lock until
//! the mount shows up (or the wait ends). Everyone else only polls.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hf3fs_csi_shared::errors::{CsiError, CsiResult};
use tokio_util::sync::CancellationToken;

use super::launcher::write_launcher_config;
use super::process::ProcessLauncher;
use super::table::MountTable;
use crate::config::ClusterMountConfig;
use crate::lock::LockCoordinator;
use crate::util::create_dir_with_mode;
use crate::util::wait::{WaitError, WaitPolicy, poll_until};

/// Something that can guarantee the cluster's shared mount is present.
#[async_trait]
pub trait SharedMount: Send + Sync {
    /// Where the shared mount lives.
    fn mount_point(&self) -> PathBuf;

    /// Return once the shared mount is confirmed present in the mount table.
    async fn ensure_ready(&self, cancel: &CancellationToken) -> CsiResult<()>;
}

/// Progress of one [`ClientSupervisor::ensure_shared_mount`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Uninitialized,
    LockHeld,
    LockNotHeld,
    ConfigWritten,
    ProcessStarted,
    WaitingForMount,
    MountReady,
    TimedOut,
    LaunchFailed,
    Cancelled,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SupervisorState::Uninitialized => "uninitialized",
            SupervisorState::LockHeld => "lock_held",
            SupervisorState::LockNotHeld => "lock_not_held",
            SupervisorState::ConfigWritten => "config_written",
            SupervisorState::ProcessStarted => "process_started",
            SupervisorState::WaitingForMount => "waiting_for_mount",
            SupervisorState::MountReady => "mount_ready",
            SupervisorState::TimedOut => "timed_out",
            SupervisorState::LaunchFailed => "launch_failed",
            SupervisorState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Launches `hf3fs_fuse_main` at most once per node and cluster, and waits
/// for its mount.
pub struct ClientSupervisor {
    config: Arc<ClusterMountConfig>,
    locks: Arc<dyn LockCoordinator>,
    table: Arc<dyn MountTable>,
    launcher: Arc<dyn ProcessLauncher>,
    wait_policy: WaitPolicy,
    state: Mutex<SupervisorState>,
}

impl ClientSupervisor {
    pub fn new(
        config: Arc<ClusterMountConfig>,
        locks: Arc<dyn LockCoordinator>,
        table: Arc<dyn MountTable>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            config,
            locks,
            table,
            launcher,
            wait_policy: WaitPolicy::default(),
            state: Mutex::new(SupervisorState::Uninitialized),
        }
    }

    pub fn with_wait_policy(mut self, wait_policy: WaitPolicy) -> Self {
        self.wait_policy = wait_policy;
        self
    }

    /// Last state reached by any [`ensure_shared_mount`](Self::ensure_shared_mount)
    /// call on this supervisor. Every call starts over from `Uninitialized`.
    pub fn state(&self) -> SupervisorState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ensure the shared mount exists, launching the client if this caller
    /// wins the mount lock.
    ///
    /// # Errors
    ///
    /// - [`CsiError::Cancelled`] if `cancel` fires (or already has) before the
    ///   mount appears. A client that was already started keeps running.
    /// - [`CsiError::Lock`] on lock-file failures other than contention.
    /// - [`CsiError::Launch`] if the client could not be started.
    /// - [`CsiError::MountTimeout`] if the mount did not appear in time.
    pub async fn ensure_shared_mount(&self, cancel: &CancellationToken) -> CsiResult<()> {
        let cluster_id = self.config.cluster_id.as_str();
        let mount_point = self.config.global_mount_point();

        self.transition(SupervisorState::Uninitialized);
        if cancel.is_cancelled() {
            return Err(self.finish(SupervisorState::Cancelled, cancelled_error(&mount_point)));
        }

        create_dir_with_mode(&mount_point, 0o755)?;
        create_dir_with_mode(&self.config.config_dir, 0o755)?;

        let Some(guard) = self.locks.try_acquire(cluster_id)? else {
            self.transition(SupervisorState::LockNotHeld);
            return self.wait_for_mount(&mount_point, cancel).await;
        };
        self.transition(SupervisorState::LockHeld);

        // Guard is held through the wait so no other caller relaunches
        let result = self.launch_and_wait(&mount_point, cancel).await;
        drop(guard);
        result
    }

    async fn launch_and_wait(
        &self,
        mount_point: &Path,
        cancel: &CancellationToken,
    ) -> CsiResult<()> {
        if self.table.is_mount_point(mount_point)? {
            tracing::debug!(mount_point = %mount_point.display(), "Shared mount already present");
            self.transition(SupervisorState::MountReady);
            return Ok(());
        }

        write_launcher_config(&self.config)?;
        self.transition(SupervisorState::ConfigWritten);

        let binary = &self.config.hf3fs_binary_path;
        let config_path = self.config.launcher_path();
        tracing::info!(
            bin = %binary.display(),
            cfg = %config_path.display(),
            mount = %mount_point.display(),
            "Starting hf3fs_fuse_main"
        );
        let pid = self
            .launcher
            .spawn(binary, &config_path)
            .map_err(|e| self.finish(SupervisorState::LaunchFailed, e))?;
        tracing::debug!(pid, "hf3fs_fuse_main spawned");
        self.transition(SupervisorState::ProcessStarted);

        self.wait_for_mount(mount_point, cancel).await
    }

    async fn wait_for_mount(
        &self,
        mount_point: &Path,
        cancel: &CancellationToken,
    ) -> CsiResult<()> {
        self.transition(SupervisorState::WaitingForMount);

        let table = &self.table;
        let result = poll_until(
            || table.is_mount_point(mount_point),
            self.wait_policy,
            cancel,
        )
        .await;

        match result {
            Ok(()) => {
                self.transition(SupervisorState::MountReady);
                tracing::info!(mount_point = %mount_point.display(), "Shared mount is ready");
                Ok(())
            }
            Err(WaitError::Cancelled) => {
                Err(self.finish(SupervisorState::Cancelled, cancelled_error(mount_point)))
            }
            Err(WaitError::TimedOut {
                elapsed,
                last_error,
            }) => {
                let detail = match last_error {
                    Some(e) => format!(
                        "{} not mounted after {:?}: {}",
                        mount_point.display(),
                        elapsed,
                        e
                    ),
                    None => format!("{} not mounted after {:?}", mount_point.display(), elapsed),
                };
                Err(self.finish(SupervisorState::TimedOut, CsiError::MountTimeout(detail)))
            }
        }
    }

    fn transition(&self, state: SupervisorState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        tracing::debug!(cluster_id = %self.config.cluster_id, %state, "Shared mount state");
    }

    fn finish(&self, state: SupervisorState, err: CsiError) -> CsiError {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        tracing::warn!(
            cluster_id = %self.config.cluster_id,
            %state,
            error = %err,
            "Shared mount not ready"
        );
        err
    }
}

#[async_trait]
impl SharedMount for ClientSupervisor {
    fn mount_point(&self) -> PathBuf {
        self.config.global_mount_point()
    }

    async fn ensure_ready(&self, cancel: &CancellationToken) -> CsiResult<()> {
        self.ensure_shared_mount(cancel).await
    }
}

fn cancelled_error(mount_point: &Path) -> CsiError {
    CsiError::Cancelled(format!("waiting for shared mount {}", mount_point.display()))
}
