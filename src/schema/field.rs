//! Field descriptors.

use crate::error::{Result, RomError};

/// Where a field's `offset` is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Relative to the struct instance's base offset.
    Parent,
    /// Relative to the ROM base (offset 0, post-header), used by
    /// pointer-followed subfields that attach to an unrelated struct.
    Root,
}

impl Origin {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "parent" => Ok(Self::Parent),
            "root" => Ok(Self::Root),
            other => Err(RomError::SchemaError(format!("unknown field origin `{other}`"))),
        }
    }
}

/// How a field's value is rendered to / parsed from TSV text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Default,
    Hex,
    Decimal,
    Text,
}

impl Display {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" | "default" => Ok(Self::Default),
            "hex" => Ok(Self::Hex),
            "dec" | "decimal" => Ok(Self::Decimal),
            "text" => Ok(Self::Text),
            other => Err(RomError::SchemaError(format!("unknown display hint `{other}`"))),
        }
    }
}

/// What a field's integer value indexes, resolved at schema-load time by
/// matching the map's declared enum and table names (`structs.tsv` carries
/// a single `ref` column; this crate disambiguates it once, here, rather
/// than re-deciding it on every read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Enum(String),
    Table(String),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub id: String,
    pub name: String,
    pub type_name: String,
    pub offset_bits: u64,
    pub size_bits: u32,
    pub origin: Origin,
    pub reference: Option<Reference>,
    pub display: Display,
    pub optional: bool,
    pub comment: String,
}

impl Field {
    pub fn end_bits(&self) -> u64 {
        self.offset_bits + self.size_bits as u64
    }
}
