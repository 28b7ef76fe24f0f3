use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use hf3fs_csi::UnpublishVolumeRequest;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct UnpublishArgs {
    #[arg(long)]
    pub volume_id: String,

    #[arg(long)]
    pub target_path: PathBuf,
}

pub async fn execute(args: UnpublishArgs, global: &GlobalFlags) -> Result<()> {
    let service = global.create_service()?;

    let request = UnpublishVolumeRequest {
        volume_id: args.volume_id,
        target_path: args.target_path,
    };
    service.unpublish_volume(&request)?;
    println!("Unpublished {}", request.volume_id);

    Ok(())
}
