//! Node plugin configuration.
//!
//! Loaded once at startup from the process environment and shared read-only
//! (as `Arc<ClusterMountConfig>`) by every request afterwards.

use std::path::PathBuf;

use hf3fs_csi_shared::errors::{CsiError, CsiResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DRIVER_NAME: &str = "fs.3fs.dev";
pub const DEFAULT_GLOBAL_MOUNT_BASE: &str = "/var/lib/3fs/mnt";
pub const DEFAULT_CONFIG_DIR: &str = "/var/lib/3fs/etc";
pub const DEFAULT_TOKEN_FILE: &str = "/var/lib/3fs/token.txt";
pub const DEFAULT_HF3FS_BINARY_PATH: &str = "/opt/3fs/bin/hf3fs_fuse_main";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// File name of the rendered launcher config inside the config directory.
pub const LAUNCHER_FILE_NAME: &str = "hf3fs_fuse_main_launcher.toml";

/// Kubelet plugin registration root.
const KUBELET_PLUGINS_DIR: &str = "/var/lib/kubelet/plugins";

/// Environment variables holding management-service addresses, in lookup order.
///
/// The misspelled variants are accepted for compatibility with existing
/// DaemonSet manifests.
const MGMTD_ADDRESS_VARS: &[&str] = &[
    "MGMtd_ADDRESSES",
    "MGMTPD_ADDRESSES",
    "MGMtd_ADDRESSES_JSON",
    "MGMTD_ADDRESSES",
];

/// Immutable per-process configuration for one 3FS cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMountConfig {
    pub driver_name: String,
    pub cluster_id: String,
    pub mgmtd_addresses: Vec<String>,
    pub global_mount_base: PathBuf,
    pub config_dir: PathBuf,
    pub token_file: PathBuf,
    pub hf3fs_binary_path: PathBuf,
    pub log_level: String,
    pub node_id: String,
}

impl ClusterMountConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> CsiResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Load configuration through a custom variable lookup.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> CsiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let cluster_id = get("CLUSTER_ID")
            .ok_or_else(|| CsiError::Config("CLUSTER_ID is required".to_string()))?;
        validate_cluster_id(&cluster_id)?;

        let raw_addresses = MGMTD_ADDRESS_VARS
            .iter()
            .find_map(|key| get(key))
            .ok_or_else(|| {
                CsiError::Config("MGMTD_ADDRESSES is required (JSON array string)".to_string())
            })?;
        let mgmtd_addresses = parse_mgmtd_addresses(&raw_addresses)?;

        let node_id = get("NODE_ID").unwrap_or_else(default_node_id);

        Ok(Self {
            driver_name: get_or("CSI_DRIVER_NAME", DEFAULT_DRIVER_NAME),
            cluster_id,
            mgmtd_addresses,
            global_mount_base: get_or("GLOBAL_MOUNT_BASE", DEFAULT_GLOBAL_MOUNT_BASE).into(),
            config_dir: get_or("CONFIG_DIR", DEFAULT_CONFIG_DIR).into(),
            token_file: get_or("TOKEN_FILE", DEFAULT_TOKEN_FILE).into(),
            hf3fs_binary_path: get_or("HF3FS_BINARY_PATH", DEFAULT_HF3FS_BINARY_PATH).into(),
            log_level: get_or("LOG_LEVEL", DEFAULT_LOG_LEVEL),
            node_id,
        })
    }

    /// Shared mount of the cluster: `{global_mount_base}/{cluster_id}`.
    pub fn global_mount_point(&self) -> PathBuf {
        self.global_mount_base.join(&self.cluster_id)
    }

    /// Rendered launcher config consumed by `hf3fs_fuse_main`.
    pub fn launcher_path(&self) -> PathBuf {
        self.config_dir.join(LAUNCHER_FILE_NAME)
    }

    /// Lock file guarding client launch: `{config_dir}/{cluster_id}.mount.lock`.
    pub fn lock_path(&self) -> PathBuf {
        self.config_dir
            .join(format!("{}.mount.lock", self.cluster_id))
    }

    /// Unix socket the CSI endpoint is served on.
    pub fn plugin_socket_path(&self) -> PathBuf {
        PathBuf::from(KUBELET_PLUGINS_DIR)
            .join(&self.driver_name)
            .join("csi.sock")
    }
}

/// The cluster id becomes a path component, so it must be a single one.
fn validate_cluster_id(cluster_id: &str) -> CsiResult<()> {
    if cluster_id == "."
        || cluster_id == ".."
        || cluster_id.contains('/')
        || cluster_id.contains('\0')
    {
        return Err(CsiError::Config(format!(
            "CLUSTER_ID must be a single path component, got {:?}",
            cluster_id
        )));
    }
    Ok(())
}

/// Parse a JSON array of addresses, falling back to a comma-separated list.
pub fn parse_mgmtd_addresses(raw: &str) -> CsiResult<Vec<String>> {
    let json_err = match serde_json::from_str::<Vec<String>>(raw) {
        Ok(addresses) if !addresses.is_empty() => return Ok(addresses),
        Ok(_) => {
            return Err(CsiError::Config(
                "MGMTD_ADDRESSES must contain at least one address".to_string(),
            ));
        }
        Err(e) => e,
    };

    let parts: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(CsiError::Config(format!(
            "failed to parse MGMTD_ADDRESSES: {}",
            json_err
        )));
    }
    Ok(parts)
}

fn default_node_id() -> String {
    sysinfo::System::host_name()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "node-unknown".to_string())
}
