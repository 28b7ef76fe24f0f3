//! CLI definition and argument parsing for the node plugin.

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use hf3fs_csi::{ClusterMountConfig, NodeService};

#[derive(Parser, Debug)]
#[command(name = "hf3fs-csi", author, version, about = "3FS CSI node plugin")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the resolved configuration and plugin identity
    Info(crate::commands::info::InfoArgs),

    /// Print the launcher config that would be handed to hf3fs_fuse_main
    Render(crate::commands::render::RenderArgs),

    /// Bring up the cluster's shared mount
    EnsureMount(crate::commands::ensure_mount::EnsureMountArgs),

    /// Bind a sub-path of the shared mount onto a target directory
    Publish(crate::commands::publish::PublishArgs),

    /// Remove a published bind mount
    Unpublish(crate::commands::unpublish::UnpublishArgs),

    /// Report filesystem usage of a volume path
    Stats(crate::commands::stats::StatsArgs),
}

// ============================================================================
// GLOBAL FLAGS
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl GlobalFlags {
    pub fn load_config(&self) -> anyhow::Result<Arc<ClusterMountConfig>> {
        Ok(Arc::new(ClusterMountConfig::from_env()?))
    }

    pub fn create_service(&self) -> anyhow::Result<NodeService> {
        let config = self.load_config()?;
        NodeService::from_config(config).map_err(Into::into)
    }
}
