use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use hf3fs_csi::PublishVolumeRequest;

use crate::cli::GlobalFlags;
use crate::commands::cancel_on_ctrl_c;

#[derive(Args, Debug)]
pub struct PublishArgs {
    #[arg(long)]
    pub volume_id: String,

    /// Directory the workload sees
    #[arg(long)]
    pub target_path: PathBuf,

    /// Directory inside the shared mount to expose
    #[arg(long)]
    pub sub_path: String,
}

pub async fn execute(args: PublishArgs, global: &GlobalFlags) -> Result<()> {
    let service = global.create_service()?;
    let cancel = cancel_on_ctrl_c();

    let request = PublishVolumeRequest {
        volume_id: args.volume_id,
        target_path: args.target_path,
        sub_path: args.sub_path,
    };
    service.publish_volume(&request, &cancel).await?;
    println!("Published {} at {}", request.volume_id, request.target_path.display());

    Ok(())
}
