//! Request and response values of the node service.
//!
//! These mirror the CSI node and identity messages the plugin answers, minus
//! the wire encoding.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Volume context key carrying the workload's slice of the shared mount.
pub const SUB_PATH_KEY: &str = "subPath";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishVolumeRequest {
    pub volume_id: String,
    pub target_path: PathBuf,
    pub sub_path: String,
}

impl PublishVolumeRequest {
    /// Build a request from a CSI volume context, reading `subPath`.
    ///
    /// A missing key leaves `sub_path` empty, which publishing rejects.
    pub fn from_volume_context(
        volume_id: impl Into<String>,
        target_path: impl Into<PathBuf>,
        volume_context: &HashMap<String, String>,
    ) -> Self {
        Self {
            volume_id: volume_id.into(),
            target_path: target_path.into(),
            sub_path: volume_context.get(SUB_PATH_KEY).cloned().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpublishVolumeRequest {
    pub volume_id: String,
    pub target_path: PathBuf,
}

/// One workload's view of a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub volume_id: String,
    pub sub_path: String,
    pub target_path: PathBuf,
}

impl VolumeBinding {
    /// Directory inside `shared_mount` that gets bound onto the target.
    ///
    /// Always a descendant of (or equal to) `shared_mount`.
    pub fn source_path(&self, shared_mount: &Path) -> PathBuf {
        shared_mount.join(normalize_sub_path(&self.sub_path))
    }
}

/// Lexically normalize a caller-supplied sub-path into a relative path that
/// cannot escape its base.
///
/// `.` is dropped, `..` pops a previous component and is clamped at the base,
/// and leading `/` is ignored. So `"../../etc/passwd"` becomes
/// `"etc/passwd"` and `"a/../../b"` becomes `"b"`.
pub fn normalize_sub_path(sub_path: &str) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in Path::new(sub_path).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    normalized
}

/// Space usage of a mounted volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStats {
    pub bytes: Usage,
    pub inodes: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub total: u64,
    pub used: u64,
    pub available: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub vendor_version: String,
}

/// Optional node RPCs the plugin implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCapability {
    GetVolumeStats,
}
