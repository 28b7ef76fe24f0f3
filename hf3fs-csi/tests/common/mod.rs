//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hf3fs_csi::mount::ProcessLauncher;
use hf3fs_csi::util::WaitPolicy;
use hf3fs_csi::{
    BindMountManager, ClientSupervisor, ClusterMountConfig, CsiError, CsiResult,
    InMemoryLockCoordinator, InMemoryMountTable, NodeService,
};
use tempfile::TempDir;

/// Stands in for `hf3fs_fuse_main`: records spawns and, if configured,
/// mounts the shared mount point after `mount_after`.
pub struct FakeClient {
    table: Arc<InMemoryMountTable>,
    mount_point: PathBuf,
    mount_after: Option<Duration>,
    pids: Mutex<Vec<u32>>,
}

impl FakeClient {
    pub fn spawn_count(&self) -> usize {
        self.pids.lock().unwrap().len()
    }
}

impl ProcessLauncher for FakeClient {
    fn spawn(&self, _binary: &Path, config_path: &Path) -> CsiResult<u32> {
        if !config_path.exists() {
            return Err(CsiError::Launch("launcher config missing".to_string()));
        }
        let mut pids = self.pids.lock().unwrap();
        let pid = 4000 + pids.len() as u32;
        pids.push(pid);

        if let Some(delay) = self.mount_after {
            let table = self.table.clone();
            let mount_point = self.mount_point.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                table.mount(&mount_point);
            });
        }
        Ok(pid)
    }
}

/// One simulated node with cluster `c1`.
pub struct Node {
    pub service: NodeService,
    pub config: Arc<ClusterMountConfig>,
    pub locks: Arc<InMemoryLockCoordinator>,
    pub table: Arc<InMemoryMountTable>,
    pub launcher: Arc<FakeClient>,
    pub temp: TempDir,
}

impl Node {
    pub fn kubelet_root(&self) -> PathBuf {
        self.temp.path().join("kubelet")
    }
}

/// Build a node whose client mounts after `mount_after` (never if `None`).
pub fn node(mount_after: Option<Duration>) -> Node {
    let temp = TempDir::new().unwrap();
    let config = Arc::new(ClusterMountConfig {
        driver_name: "fs.3fs.dev".to_string(),
        cluster_id: "c1".to_string(),
        mgmtd_addresses: vec!["RDMA://192.168.1.1:8000".to_string()],
        global_mount_base: temp.path().join("mnt"),
        config_dir: temp.path().join("etc"),
        token_file: temp.path().join("token.txt"),
        hf3fs_binary_path: PathBuf::from("/opt/3fs/bin/hf3fs_fuse_main"),
        log_level: "debug".to_string(),
        node_id: "node-a".to_string(),
    });

    let locks = Arc::new(InMemoryLockCoordinator::new());
    let table = Arc::new(InMemoryMountTable::new());
    let launcher = Arc::new(FakeClient {
        table: table.clone(),
        mount_point: config.global_mount_point(),
        mount_after,
        pids: Mutex::new(Vec::new()),
    });

    let supervisor = ClientSupervisor::new(
        config.clone(),
        locks.clone(),
        table.clone(),
        launcher.clone(),
    )
    .with_wait_policy(WaitPolicy {
        interval: Duration::from_millis(500),
        timeout: Duration::from_secs(60),
    });
    let binds = BindMountManager::new(table.clone(), table.clone());
    let service = NodeService::new(config.clone(), Arc::new(supervisor), binds)
        .with_kubelet_root(temp.path().join("kubelet"));

    Node {
        service,
        config,
        locks,
        table,
        launcher,
        temp,
    }
}
