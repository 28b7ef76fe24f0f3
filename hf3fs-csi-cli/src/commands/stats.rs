use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use hf3fs_csi::node::volume_stats;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct StatsArgs {
    #[arg(long)]
    pub volume_path: PathBuf,
}

/// Usage does not depend on cluster configuration, so none is loaded.
pub async fn execute(args: StatsArgs, _global: &GlobalFlags) -> Result<()> {
    if args.volume_path.as_os_str().is_empty() {
        bail!("volume path is required");
    }
    let stats = volume_stats(&args.volume_path)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
