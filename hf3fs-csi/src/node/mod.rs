//! Node-side volume lifecycle.
//!
//! [`NodeService`] answers the node and identity calls of the plugin:
//! publishing a workload's sub-path of the shared cluster mount onto its
//! target directory, undoing that, and reporting usage and identity.

mod stats;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hf3fs_csi_shared::errors::{CsiError, CsiResult};
use tokio_util::sync::CancellationToken;

use crate::config::ClusterMountConfig;
use crate::lock::FileLockCoordinator;
use crate::mount::{
    BindMountManager, ClientSupervisor, CommandLauncher, NativeMountOps, ProcMountTable,
    PublishOutcome, SharedMount, UnpublishOutcome,
};
use crate::util::Advisory;

pub use stats::volume_stats;
pub use types::{
    NodeCapability, NodeInfo, PluginInfo, PublishVolumeRequest, SUB_PATH_KEY,
    UnpublishVolumeRequest, Usage, VolumeBinding, VolumeStats, normalize_sub_path,
};

/// Default kubelet root, tried first when enabling mount propagation.
pub const DEFAULT_KUBELET_ROOT: &str = "/var/lib/kubelet";

/// Version reported by the identity service.
pub const VENDOR_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

pub struct NodeService {
    config: Arc<ClusterMountConfig>,
    shared: Arc<dyn SharedMount>,
    binds: BindMountManager,
    kubelet_root: PathBuf,
}

impl NodeService {
    pub fn new(
        config: Arc<ClusterMountConfig>,
        shared: Arc<dyn SharedMount>,
        binds: BindMountManager,
    ) -> Self {
        Self {
            config,
            shared,
            binds,
            kubelet_root: PathBuf::from(DEFAULT_KUBELET_ROOT),
        }
    }

    /// Wire the service to the real host: flock files under the config
    /// directory, `/proc/self/mountinfo`, mount(2) and the client binary.
    pub fn from_config(config: Arc<ClusterMountConfig>) -> CsiResult<Self> {
        let locks = Arc::new(FileLockCoordinator::new(&config.config_dir)?);
        let table = Arc::new(ProcMountTable::new());
        let ops = Arc::new(NativeMountOps);
        let supervisor = ClientSupervisor::new(
            config.clone(),
            locks,
            table.clone(),
            Arc::new(CommandLauncher),
        );
        let binds = BindMountManager::new(table, ops);
        Ok(Self::new(config, Arc::new(supervisor), binds))
    }

    pub fn with_kubelet_root(mut self, kubelet_root: impl Into<PathBuf>) -> Self {
        self.kubelet_root = kubelet_root.into();
        self
    }

    pub fn config(&self) -> &ClusterMountConfig {
        &self.config
    }

    /// Bring up the cluster's shared mount without publishing anything.
    ///
    /// Returns the mount point once it is present.
    pub async fn ensure_shared_mount(&self, cancel: &CancellationToken) -> CsiResult<PathBuf> {
        self.shared.ensure_ready(cancel).await?;
        Ok(self.shared.mount_point())
    }

    /// Make `sub_path` of the shared mount visible at `target_path`.
    ///
    /// Launches the cluster's filesystem client first if nobody has yet.
    /// Idempotent: a target that is already a mount point is left alone.
    pub async fn publish_volume(
        &self,
        request: &PublishVolumeRequest,
        cancel: &CancellationToken,
    ) -> CsiResult<()> {
        require("volume_id", !request.volume_id.is_empty())?;
        require("target_path", !request.target_path.as_os_str().is_empty())?;
        require("sub_path", !request.sub_path.is_empty())?;

        tracing::info!(
            volume_id = %request.volume_id,
            target = %request.target_path.display(),
            sub_path = %request.sub_path,
            "Publishing volume"
        );

        self.shared.ensure_ready(cancel).await?;

        let _ = self
            .binds
            .ensure_any_shared(&self.propagation_candidates(&request.target_path));

        let binding = VolumeBinding {
            volume_id: request.volume_id.clone(),
            sub_path: request.sub_path.clone(),
            target_path: request.target_path.clone(),
        };
        let source = binding.source_path(&self.shared.mount_point());

        match self.binds.publish(&source, &binding.target_path)? {
            PublishOutcome::AlreadyMounted => {
                tracing::info!(volume_id = %binding.volume_id, "Volume already published");
            }
            PublishOutcome::Mounted { .. } => {
                tracing::info!(
                    volume_id = %binding.volume_id,
                    source = %source.display(),
                    "Volume published"
                );
            }
        }
        Ok(())
    }

    /// Undo [`publish_volume`](Self::publish_volume). Unpublishing a target
    /// that is not mounted succeeds.
    ///
    /// The shared mount and its client are never torn down here.
    pub fn unpublish_volume(&self, request: &UnpublishVolumeRequest) -> CsiResult<()> {
        require("volume_id", !request.volume_id.is_empty())?;
        require("target_path", !request.target_path.as_os_str().is_empty())?;

        let outcome = self.binds.unpublish(&request.target_path)?;
        let _ = remove_target_dir(&request.target_path);

        match outcome {
            UnpublishOutcome::NotMounted => {
                tracing::info!(volume_id = %request.volume_id, "Volume was not published");
            }
            UnpublishOutcome::Unmounted => {
                tracing::info!(volume_id = %request.volume_id, "Volume unpublished");
            }
        }
        Ok(())
    }

    pub fn volume_stats(&self, volume_path: &Path) -> CsiResult<VolumeStats> {
        require("volume_path", !volume_path.as_os_str().is_empty())?;
        volume_stats(volume_path)
    }

    pub fn node_info(&self) -> NodeInfo {
        NodeInfo {
            node_id: self.config.node_id.clone(),
        }
    }

    pub fn capabilities(&self) -> Vec<NodeCapability> {
        vec![NodeCapability::GetVolumeStats]
    }

    pub fn plugin_info(&self) -> PluginInfo {
        PluginInfo {
            name: self.config.driver_name.clone(),
            vendor_version: VENDOR_VERSION.to_string(),
        }
    }

    /// The plugin is ready as soon as it is configured; the shared mount is
    /// brought up lazily by the first publish.
    pub fn probe(&self) -> bool {
        true
    }

    fn propagation_candidates(&self, target: &Path) -> Vec<PathBuf> {
        let mut candidates = vec![self.kubelet_root.clone()];
        if let Some(parent) = target.parent() {
            candidates.push(parent.to_path_buf());
        }
        candidates
    }
}

fn require(field: &str, present: bool) -> CsiResult<()> {
    if present {
        Ok(())
    } else {
        Err(CsiError::InvalidArgument(format!("{field} is required")))
    }
}

/// Remove the emptied target directory. Missing is fine; a non-empty or
/// still-mounted directory is left in place.
fn remove_target_dir(target: &Path) -> Advisory {
    let result = match std::fs::remove_dir(target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CsiError::Storage(format!(
            "remove {}: {}",
            target.display(),
            e
        ))),
    };
    Advisory::capture("remove_target", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::{InMemoryMountTable, MountTable};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Shared mount that is always ready, or never.
    struct StaticMount {
        mount_point: PathBuf,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SharedMount for StaticMount {
        fn mount_point(&self) -> PathBuf {
            self.mount_point.clone()
        }

        async fn ensure_ready(&self, _cancel: &CancellationToken) -> CsiResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CsiError::MountTimeout("shared mount".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        service: NodeService,
        shared: Arc<StaticMount>,
        table: Arc<InMemoryMountTable>,
        temp: TempDir,
    }

    fn fixture(fail: bool) -> Fixture {
        let temp = TempDir::new().unwrap();
        let config = Arc::new(ClusterMountConfig {
            driver_name: "fs.3fs.dev".to_string(),
            cluster_id: "c1".to_string(),
            mgmtd_addresses: vec!["RDMA://10.0.0.1:8000".to_string()],
            global_mount_base: temp.path().join("mnt"),
            config_dir: temp.path().join("etc"),
            token_file: temp.path().join("token.txt"),
            hf3fs_binary_path: PathBuf::from("/opt/3fs/bin/hf3fs_fuse_main"),
            log_level: "info".to_string(),
            node_id: "node-a".to_string(),
        });
        let shared = Arc::new(StaticMount {
            mount_point: config.global_mount_point(),
            fail,
            calls: AtomicUsize::new(0),
        });
        let table = Arc::new(InMemoryMountTable::new());
        let binds = BindMountManager::new(table.clone(), table.clone());
        let service = NodeService::new(config, shared.clone(), binds)
            .with_kubelet_root(temp.path().join("kubelet"));
        Fixture {
            service,
            shared,
            table,
            temp,
        }
    }

    fn publish_request(fx: &Fixture, sub_path: &str) -> PublishVolumeRequest {
        PublishVolumeRequest {
            volume_id: "pvc-1".to_string(),
            target_path: fx.temp.path().join("kubelet/pods/x/volumes/y"),
            sub_path: sub_path.to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_binds_sub_path() {
        let fx = fixture(false);
        let req = publish_request(&fx, "pvc-1/data");

        fx.service
            .publish_volume(&req, &CancellationToken::new())
            .await
            .unwrap();

        let expected = fx.temp.path().join("mnt/c1/pvc-1/data");
        assert_eq!(fx.table.bind_source(&req.target_path), Some(expected.clone()));
        assert!(expected.is_dir());
        assert_eq!(fx.shared.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_publish_rejects_missing_arguments() {
        let fx = fixture(false);
        let cancel = CancellationToken::new();

        let mut req = publish_request(&fx, "pvc-1/data");
        req.volume_id.clear();
        let err = fx.service.publish_volume(&req, &cancel).await.unwrap_err();
        assert!(matches!(err, CsiError::InvalidArgument(_)));

        let mut req = publish_request(&fx, "pvc-1/data");
        req.target_path = PathBuf::new();
        let err = fx.service.publish_volume(&req, &cancel).await.unwrap_err();
        assert!(matches!(err, CsiError::InvalidArgument(_)));

        let req = publish_request(&fx, "");
        let err = fx.service.publish_volume(&req, &cancel).await.unwrap_err();
        assert!(matches!(err, CsiError::InvalidArgument(_)));

        assert_eq!(fx.shared.calls.load(Ordering::SeqCst), 0, "validated before mounting");
        assert_eq!(fx.table.bind_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_contains_traversal() {
        let fx = fixture(false);
        let req = publish_request(&fx, "../../etc/passwd");

        fx.service
            .publish_volume(&req, &CancellationToken::new())
            .await
            .unwrap();

        let source = fx.table.bind_source(&req.target_path).unwrap();
        assert!(source.starts_with(fx.temp.path().join("mnt/c1")));
        assert_eq!(source, fx.temp.path().join("mnt/c1/etc/passwd"));
    }

    #[tokio::test]
    async fn test_publish_surfaces_shared_mount_failure() {
        let fx = fixture(true);
        let req = publish_request(&fx, "pvc-1/data");

        let err = fx
            .service
            .publish_volume(&req, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CsiError::MountTimeout(_)));
        assert_eq!(fx.table.bind_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_marks_target_parent_shared_when_kubelet_root_fails() {
        let fx = fixture(false);
        let req = publish_request(&fx, "pvc-1/data");
        let parent = req.target_path.parent().unwrap().to_path_buf();
        fx.table.mount(&parent);

        fx.service
            .publish_volume(&req, &CancellationToken::new())
            .await
            .unwrap();

        assert!(fx.table.is_shared_propagation(&parent).unwrap());
    }

    #[tokio::test]
    async fn test_unpublish_removes_target() {
        let fx = fixture(false);
        let req = publish_request(&fx, "pvc-1/data");
        fx.service
            .publish_volume(&req, &CancellationToken::new())
            .await
            .unwrap();

        fx.service
            .unpublish_volume(&UnpublishVolumeRequest {
                volume_id: req.volume_id.clone(),
                target_path: req.target_path.clone(),
            })
            .unwrap();

        assert_eq!(fx.table.unmount_count(), 1);
        assert!(!req.target_path.exists());
        assert!(fx.temp.path().join("mnt/c1/pvc-1/data").is_dir(), "source untouched");
    }

    #[test]
    fn test_unpublish_never_published_succeeds() {
        let fx = fixture(false);
        fx.service
            .unpublish_volume(&UnpublishVolumeRequest {
                volume_id: "pvc-1".to_string(),
                target_path: fx.temp.path().join("never"),
            })
            .unwrap();
        assert_eq!(fx.table.unmount_count(), 0);
    }

    #[test]
    fn test_unpublish_rejects_missing_arguments() {
        let fx = fixture(false);
        let err = fx
            .service
            .unpublish_volume(&UnpublishVolumeRequest {
                volume_id: String::new(),
                target_path: PathBuf::from("/t"),
            })
            .unwrap_err();
        assert!(matches!(err, CsiError::InvalidArgument(_)));
    }

    #[test]
    fn test_volume_stats_validation() {
        let fx = fixture(false);
        assert!(matches!(
            fx.service.volume_stats(Path::new("")),
            Err(CsiError::InvalidArgument(_))
        ));
        assert!(matches!(
            fx.service.volume_stats(&fx.temp.path().join("missing")),
            Err(CsiError::NotFound(_))
        ));
        assert!(fx.service.volume_stats(fx.temp.path()).is_ok());
    }

    #[tokio::test]
    async fn test_ensure_shared_mount_returns_mount_point() {
        let fx = fixture(false);
        let mount_point = fx
            .service
            .ensure_shared_mount(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(mount_point, fx.temp.path().join("mnt/c1"));
    }

    #[test]
    fn test_identity() {
        let fx = fixture(false);
        assert_eq!(fx.service.node_info().node_id, "node-a");
        assert_eq!(fx.service.capabilities(), vec![NodeCapability::GetVolumeStats]);
        let info = fx.service.plugin_info();
        assert_eq!(info.name, "fs.3fs.dev");
        assert_eq!(info.vendor_version, VENDOR_VERSION);
        assert!(fx.service.probe());
    }
}
