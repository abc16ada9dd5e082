use std::path::PathBuf;

use anyhow::Result;
use clap::Args as ClapArgs;
use romtool::rom::Rom;
use romtool::schema::Schema;

#[derive(Debug, ClapArgs)]
pub struct DumpArgs {
    /// directory to write `<entity>.tsv` files into
    #[arg(long)]
    out: PathBuf,
}

pub fn run(
    map: &Option<PathBuf>,
    rom: &Option<PathBuf>,
    strict: bool,
    args: &DumpArgs,
) -> Result<()> {
    let map_dir = super::required_map(map)?;
    let rom_path = super::required_rom(rom)?;
    let schema = Schema::load(map_dir)?;
    let rom = Rom::open(schema, rom_path, strict)?;
    rom.dump(&args.out)?;
    log::info!("dumped {} entities to {}", rom.schema.entities.len(), args.out.display());
    Ok(())
}
