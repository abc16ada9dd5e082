use std::path::PathBuf;

use anyhow::Result;
use clap::Args as ClapArgs;
use romtool::rom::Rom;
use romtool::schema::Schema;

#[derive(Debug, ClapArgs)]
pub struct BuildArgs {
    /// directory of edited `<entity>.tsv` files to load
    #[arg(long = "in")]
    input: PathBuf,
    /// where to write the resulting IPS patch
    #[arg(long)]
    out: PathBuf,
}

pub fn run(
    map: &Option<PathBuf>,
    rom: &Option<PathBuf>,
    strict: bool,
    args: &BuildArgs,
) -> Result<()> {
    let map_dir = super::required_map(map)?;
    let rom_path = super::required_rom(rom)?;
    let schema = Schema::load(map_dir)?;
    let mut rom = Rom::open(schema, rom_path, strict)?;
    rom.load(&args.input)?;
    let patch = rom.diff_against_original();
    let bytes = patch.to_ips()?;
    super::write_atomic(&args.out, &bytes)?;
    log::info!("wrote {} edits to {}", patch.len(), args.out.display());
    Ok(())
}
