//! CLI front-end: one `src/tools/<name>.rs` module per subcommand, dispatched
//! from `Args`/`Operation` the same way the original tool's `Args`/`Operation`
//! pair drove its `DumpTil`/`DumpID0`/... variants.

mod build;
mod diff;
mod dump;
mod patch_cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Game-independent binary ROM editor: schema-driven dump/build plus a
/// patch toolkit (diff, convert, apply, merge).
#[derive(Debug, Parser)]
#[command(name = "romtool")]
struct Args {
    /// directory holding the map (rom.tsv, structs/, tables.tsv, ...)
    #[arg(long, global = true)]
    map: Option<PathBuf>,
    /// ROM image to read or write
    #[arg(long, global = true)]
    rom: Option<PathBuf>,
    /// treat pointer/value range violations as fatal instead of warnings
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    operation: Operation,
}

#[derive(Debug, Subcommand)]
enum Operation {
    /// Dump every declared entity of the ROM to `<out>/<entity>.tsv`
    Dump(dump::DumpArgs),
    /// Load an edited entity directory back into the ROM, emitting an IPS patch
    Build(build::BuildArgs),
    /// Diff two ROM images directly into an IPS patch
    Diff(diff::DiffArgs),
    /// Patch file operations: format conversion, application, merging
    #[command(subcommand)]
    Patch(patch_cmd::PatchOperation),
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    match &args.operation {
        Operation::Dump(dump_args) => dump::run(&args.map, &args.rom, args.strict, dump_args),
        Operation::Build(build_args) => build::run(&args.map, &args.rom, args.strict, build_args),
        Operation::Diff(diff_args) => diff::run(diff_args),
        Operation::Patch(op) => patch_cmd::run(op),
    }
}

/// Writes `bytes` to `path` via a same-directory temp file, then renames it
/// into place, so a crash mid-write never leaves a half-written destination.
pub(crate) fn write_atomic(path: &std::path::Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(path.file_name().unwrap_or_default());
    tmp_name.push(".tmp");
    let tmp_path = dir.join(tmp_name);
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub(crate) fn required_map(map: &Option<PathBuf>) -> Result<&PathBuf> {
    map.as_ref().ok_or_else(|| anyhow::anyhow!("--map <dir> is required for this operation"))
}

pub(crate) fn required_rom(rom: &Option<PathBuf>) -> Result<&PathBuf> {
    rom.as_ref().ok_or_else(|| anyhow::anyhow!("--rom <file> is required for this operation"))
}
