use std::path::PathBuf;

use anyhow::Result;
use clap::{Args as ClapArgs, Subcommand, ValueEnum};
use romtool::patch::Patch;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PatchFormat {
    Ips,
    Ipst,
}

#[derive(Debug, Subcommand)]
pub enum PatchOperation {
    /// Convert a patch between the binary IPS and textual IPST forms
    Convert(ConvertArgs),
    /// Apply a patch to a ROM image, writing the result to a new file
    Apply(ApplyArgs),
    /// Merge two patches, with the second's edits winning on overlap
    Merge(MergeArgs),
}

#[derive(Debug, ClapArgs)]
pub struct ConvertArgs {
    #[arg(long = "from", value_enum)]
    from: PatchFormat,
    #[arg(long = "to", value_enum)]
    to: PatchFormat,
    input: PathBuf,
    output: PathBuf,
}

#[derive(Debug, ClapArgs)]
pub struct ApplyArgs {
    #[arg(long)]
    rom: PathBuf,
    #[arg(long)]
    patch: PathBuf,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, ClapArgs)]
pub struct MergeArgs {
    first: PathBuf,
    second: PathBuf,
    #[arg(long)]
    out: PathBuf,
}

fn read_patch(path: &std::path::Path, format: PatchFormat) -> Result<Patch> {
    match format {
        PatchFormat::Ips => Ok(Patch::from_ips(&std::fs::read(path)?)?),
        PatchFormat::Ipst => Ok(Patch::from_ipst(&std::fs::read_to_string(path)?)?),
    }
}

/// Infers a patch file's format from its extension, defaulting to IPS for
/// anything else since it's the canonical binary form.
fn guess_format(path: &std::path::Path) -> PatchFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("ipst") => PatchFormat::Ipst,
        _ => PatchFormat::Ips,
    }
}

pub fn run(op: &PatchOperation) -> Result<()> {
    match op {
        PatchOperation::Convert(args) => {
            let patch = read_patch(&args.input, args.from)?;
            let bytes = match args.to {
                PatchFormat::Ips => patch.to_ips()?,
                PatchFormat::Ipst => patch.to_ipst().into_bytes(),
            };
            super::write_atomic(&args.output, &bytes)?;
            Ok(())
        }
        PatchOperation::Apply(args) => {
            let mut image = std::fs::read(&args.rom)?;
            let patch = read_patch(&args.patch, guess_format(&args.patch))?;
            patch.apply(&mut image)?;
            super::write_atomic(&args.out, &image)?;
            Ok(())
        }
        PatchOperation::Merge(args) => {
            let a = read_patch(&args.first, guess_format(&args.first))?;
            let b = read_patch(&args.second, guess_format(&args.second))?;
            let merged = a.merge(&b);
            let bytes = merged.to_ips()?;
            super::write_atomic(&args.out, &bytes)?;
            Ok(())
        }
    }
}
