//! Bitfields: a struct whose fields are all single-bit flags with
//! mnemonic letters, numbered lsb0. Kept as its
//! own small type rather than folded into `StructDef`, the same way
//! `til::bitfield::Bitfield` stays separate from `til::struct::Struct`
//! even though both ultimately describe a fixed byte layout.

use crate::bitstream::BitArray;
use crate::error::{Result, RomError};

#[derive(Debug, Clone, Copy)]
pub struct FlagDef {
    pub mnemonic: char,
    pub bit_index: u32,
}

#[derive(Debug, Clone)]
pub struct BitfieldDef {
    pub name: String,
    pub width_bits: u32,
    pub flags: Vec<FlagDef>,
}

impl BitfieldDef {
    /// Builds a bitfield from its mnemonic letters in lsb0 order: the first
    /// letter is bit 0 (least significant) — e.g. `abcdefgh` on a byte,
    /// where setting `ace` writes `0x15`.
    pub fn from_mnemonics(name: impl Into<String>, mnemonics: &str) -> Self {
        let flags = mnemonics
            .chars()
            .enumerate()
            .map(|(i, mnemonic)| FlagDef { mnemonic, bit_index: i as u32 })
            .collect();
        Self { name: name.into(), width_bits: mnemonics.chars().count() as u32, flags }
    }

    fn flag(&self, mnemonic: char) -> Result<&FlagDef> {
        self.flags
            .iter()
            .find(|f| f.mnemonic == mnemonic)
            .ok_or_else(|| RomError::SchemaError(format!(
                "bitfield `{}` has no flag `{mnemonic}`",
                self.name
            )))
    }

    /// Renders the set flags as their concatenated mnemonic letters, in
    /// declaration order (not bit order), e.g. `"ace"`.
    pub fn render(&self, bits: &BitArray) -> String {
        self.flags
            .iter()
            .filter(|f| bits.get(f.bit_index as usize))
            .map(|f| f.mnemonic)
            .collect()
    }

    /// Parses a string of mnemonic letters back into a bit array; unknown
    /// letters are a `SchemaError` (caught as `UnparseableValue` by the
    /// TSV loader, which wraps this call).
    pub fn parse(&self, text: &str) -> Result<BitArray> {
        let mut bits = BitArray::from_u64(0, self.width_bits as usize);
        for ch in text.chars() {
            let flag = self.flag(ch)?;
            bits.set(flag.bit_index as usize, true);
        }
        Ok(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ace_round_trips_to_0x15() {
        let def = BitfieldDef::from_mnemonics("flags", "abcdefgh");
        let bits = def.parse("ace").unwrap();
        assert_eq!(bits.to_u64(), 0x15);
        assert_eq!(def.render(&bits), "ace");
    }
}
