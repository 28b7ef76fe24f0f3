use anyhow::Result;
use clap::Args;

use crate::cli::GlobalFlags;
use crate::commands::cancel_on_ctrl_c;

#[derive(Args, Debug)]
pub struct EnsureMountArgs {}

pub async fn execute(_args: EnsureMountArgs, global: &GlobalFlags) -> Result<()> {
    let service = global.create_service()?;
    let cancel = cancel_on_ctrl_c();

    let mount_point = service.ensure_shared_mount(&cancel).await?;
    println!("{}", mount_point.display());

    Ok(())
}
