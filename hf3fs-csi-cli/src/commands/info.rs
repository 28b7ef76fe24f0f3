use anyhow::Result;
use clap::Args;
use hf3fs_csi::ClusterMountConfig;
use hf3fs_csi::node::VENDOR_VERSION;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct InfoArgs {}

pub async fn execute(_args: InfoArgs, global: &GlobalFlags) -> Result<()> {
    let config = global.load_config()?;
    let resolved: &ClusterMountConfig = &config;

    let info = serde_json::json!({
        "plugin": {
            "name": config.driver_name,
            "vendor_version": VENDOR_VERSION,
        },
        "node_id": config.node_id,
        "socket": config.plugin_socket_path(),
        "global_mount_point": config.global_mount_point(),
        "launcher_path": config.launcher_path(),
        "lock_path": config.lock_path(),
        "config": resolved,
    });
    println!("{}", serde_json::to_string_pretty(&info)?);

    Ok(())
}
