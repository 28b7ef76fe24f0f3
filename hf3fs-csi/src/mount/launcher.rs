//! Launcher configuration for `hf3fs_fuse_main`.
//!
//! The client reads a small TOML file naming the cluster, the mountpoint, the
//! token file and the management-service addresses:
//!
//! ```toml
//! cluster_id = "c1"
//! mountpoint = "/var/lib/3fs/mnt/c1"
//! token_file = "/var/lib/3fs/token.txt"
//!
//! [mgmtd_client]
//! mgmtd_server_addresses = ["RDMA://10.0.0.1:8000"]
//! ```

use std::fs;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use hf3fs_csi_shared::errors::{CsiError, CsiResult};
use serde::Serialize;

use crate::config::ClusterMountConfig;

#[derive(Debug, Serialize)]
struct LauncherConfig<'a> {
    cluster_id: &'a str,
    mountpoint: &'a str,
    token_file: &'a str,
    mgmtd_client: MgmtdClient<'a>,
}

#[derive(Debug, Serialize)]
struct MgmtdClient<'a> {
    mgmtd_server_addresses: &'a [String],
}

/// Render the launcher config for `config`.
///
/// Every value goes through the TOML serializer, so quotes, backslashes and
/// newlines inside identifiers are escaped rather than interpreted.
pub fn render_launcher_config(config: &ClusterMountConfig) -> CsiResult<String> {
    let mountpoint = config.global_mount_point();
    let launcher = LauncherConfig {
        cluster_id: &config.cluster_id,
        mountpoint: path_str(&mountpoint)?,
        token_file: path_str(&config.token_file)?,
        mgmtd_client: MgmtdClient {
            mgmtd_server_addresses: &config.mgmtd_addresses,
        },
    };

    toml::to_string(&launcher)
        .map_err(|e| CsiError::Config(format!("failed to render launcher config: {}", e)))
}

/// Render and persist the launcher config at `config.launcher_path()`.
///
/// The file is written next to its destination and renamed into place, so a
/// client starting concurrently never reads a partial file.
pub fn write_launcher_config(config: &ClusterMountConfig) -> CsiResult<()> {
    let content = render_launcher_config(config)?;
    let path = config.launcher_path();
    let tmp = path.with_extension("toml.tmp");

    let storage_err = |what: &str, p: &Path, e: std::io::Error| {
        CsiError::Storage(format!("failed to {} {}: {}", what, p.display(), e))
    };

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(&tmp)
        .map_err(|e| storage_err("create", &tmp, e))?;
    file.write_all(content.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| storage_err("write", &tmp, e))?;
    drop(file);

    fs::rename(&tmp, &path).map_err(|e| storage_err("install", &path, e))?;

    tracing::debug!(path = %path.display(), "Wrote launcher config");
    Ok(())
}

fn path_str(path: &Path) -> CsiResult<&str> {
    path.to_str().ok_or_else(|| {
        CsiError::Config(format!("path is not valid UTF-8: {}", path.display()))
    })
}
