//! Node-side mount orchestration for the 3FS CSI driver.
//!
//! Every pod volume on a node is a bind mount of a sub-directory of one
//! shared FUSE mount per cluster. This crate makes sure that shared mount
//! exists (launching `hf3fs_fuse_main` at most once per node and cluster),
//! then binds workloads' sub-paths out of it.

pub mod config;
pub mod lock;
pub mod mount;
pub mod node;
pub mod util;

pub use config::ClusterMountConfig;
pub use hf3fs_csi_shared::errors::{CsiError, CsiResult, ErrorKind};
pub use lock::{FileLockCoordinator, InMemoryLockCoordinator, LockCoordinator, MountLockGuard};
pub use mount::{
    BindMountManager, ClientSupervisor, InMemoryMountTable, MountTable, ProcMountTable,
    SharedMount,
};
pub use node::{NodeService, PublishVolumeRequest, UnpublishVolumeRequest, VolumeStats};
pub use tokio_util::sync::CancellationToken;
