use std::path::PathBuf;

use anyhow::Result;
use clap::Args as ClapArgs;
use romtool::patch::Patch;

#[derive(Debug, ClapArgs)]
pub struct DiffArgs {
    /// unmodified ROM image
    #[arg(long)]
    original: PathBuf,
    /// modified ROM image
    #[arg(long)]
    edited: PathBuf,
    /// where to write the resulting IPS patch
    #[arg(long)]
    out: PathBuf,
}

pub fn run(args: &DiffArgs) -> Result<()> {
    let before = std::fs::read(&args.original)?;
    let after = std::fs::read(&args.edited)?;
    let patch = Patch::diff(&before, &after);
    let bytes = patch.to_ips()?;
    super::write_atomic(&args.out, &bytes)?;
    log::info!("wrote {} edits to {}", patch.len(), args.out.display());
    Ok(())
}
