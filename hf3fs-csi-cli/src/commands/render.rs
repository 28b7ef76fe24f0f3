use anyhow::Result;
use clap::Args;
use hf3fs_csi::mount::{render_launcher_config, write_launcher_config};

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Also write it to the config directory
    #[arg(long)]
    pub write: bool,
}

pub async fn execute(args: RenderArgs, global: &GlobalFlags) -> Result<()> {
    let config = global.load_config()?;

    if args.write {
        write_launcher_config(&config)?;
        eprintln!("Wrote {}", config.launcher_path().display());
    }
    print!("{}", render_launcher_config(&config)?);

    Ok(())
}
