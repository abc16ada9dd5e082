//! Primitive type registry — dynamic dispatch on type names.
//! `PrimitiveKind` is a closed enum with parameters, the registry is a
//! plain name -> descriptor map, and there is no inheritance. Grounded on
//! this codebase's per-variant `Type`/`TypeRaw` split (`til/array.rs`,
//! `til/pointer.rs`) and its tag-dispatch in `lib.rs::identify_idb_file`.

pub mod text;

use std::collections::HashMap;

use crate::bitstream::{BitArray, BitRead, BitWrite, Endian};
use crate::codec::text::TextCodec;
use crate::error::{Result, RomError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Integer { signed: bool },
    Bcd,
    Bytes,
    Bits,
    FixedString,
    TerminatedString,
}

/// A named descriptor: `(kind, width_bits, endianness, signedness, display)`.
/// `width_bits` doubles as an element count for `Bytes` (bytes) and
/// `FixedString` (bytes); it is unused for `TerminatedString`.
#[derive(Debug, Clone)]
pub struct PrimitiveType {
    pub name: String,
    pub kind: PrimitiveKind,
    pub endian: Endian,
}

/// A decoded primitive value, generic over every kind the registry knows
/// how to produce. `Entity`/`Tsv` render this according to the field's
/// `display` hint.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Bytes(Vec<u8>),
    Bits(BitArray),
    Text(String),
}

impl PrimitiveType {
    pub fn decode(&self, buf: &[u8], offset_bits: u64, width_bits: u32, codec: &TextCodec) -> Result<Value> {
        match self.kind {
            PrimitiveKind::Integer { signed: true } => {
                buf.read_int(offset_bits, width_bits, self.endian).map(Value::Int)
            }
            PrimitiveKind::Integer { signed: false } => {
                buf.read_raw_uint(offset_bits, width_bits, self.endian).map(Value::UInt)
            }
            PrimitiveKind::Bcd => buf.read_bcd(offset_bits, width_bits, self.endian).map(Value::UInt),
            PrimitiveKind::Bytes => buf.read_bytes(offset_bits, (width_bits / 8) as usize).map(Value::Bytes),
            PrimitiveKind::Bits => buf.read_bits(offset_bits, width_bits as usize).map(Value::Bits),
            PrimitiveKind::FixedString => buf.read_str(offset_bits, (width_bits / 8) as usize, codec).map(Value::Text),
            PrimitiveKind::TerminatedString => buf.read_strz(offset_bits, codec).map(|(s, _)| Value::Text(s)),
        }
    }

    pub fn encode(&self, buf: &mut [u8], offset_bits: u64, width_bits: u32, codec: &TextCodec, value: &Value) -> Result<()> {
        match (self.kind, value) {
            (PrimitiveKind::Integer { signed: true }, Value::Int(v)) => {
                buf.write_int(offset_bits, width_bits, self.endian, *v)
            }
            (PrimitiveKind::Integer { signed: false }, Value::UInt(v)) => {
                buf.write_raw_uint(offset_bits, width_bits, self.endian, *v)
            }
            (PrimitiveKind::Bcd, Value::UInt(v)) => buf.write_bcd(offset_bits, width_bits, self.endian, *v),
            (PrimitiveKind::Bytes, Value::Bytes(bytes)) => buf.write_bytes(offset_bits, bytes),
            (PrimitiveKind::Bits, Value::Bits(bits)) => buf.write_bits(offset_bits, bits),
            (PrimitiveKind::FixedString, Value::Text(text)) => {
                buf.write_str(offset_bits, (width_bits / 8) as usize, codec, text)
            }
            (PrimitiveKind::TerminatedString, Value::Text(text)) => {
                buf.write_strz(offset_bits, codec, text).map(|_| ())
            }
            _ => Err(RomError::SchemaError(format!(
                "value does not match the kind of primitive type `{}`",
                self.name
            ))),
        }
    }

    /// Whether this kind has a fixed bit width for a struct member, as
    /// opposed to `TerminatedString`, whose size is only known after reading.
    pub fn has_fixed_width(&self) -> bool {
        !matches!(self.kind, PrimitiveKind::TerminatedString)
    }
}

/// Map-scoped registry of primitive type names, re-created per ROM load
/// so separately loaded schemas never share or leak registered types.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, PrimitiveType>,
}

impl TypeRegistry {
    pub fn with_builtins() -> Self {
        let mut types = HashMap::new();
        let mut register = |name: &str, kind: PrimitiveKind, endian: Endian| {
            types.insert(
                name.to_string(),
                PrimitiveType { name: name.to_string(), kind, endian },
            );
        };
        // Plain `int`/`uint` default to little-endian, the common cartridge
        // byte order; `*be`/`*le` spell the endianness out explicitly.
        register("int", PrimitiveKind::Integer { signed: true }, Endian::Little);
        register("uint", PrimitiveKind::Integer { signed: false }, Endian::Little);
        register("intbe", PrimitiveKind::Integer { signed: true }, Endian::Big);
        register("intle", PrimitiveKind::Integer { signed: true }, Endian::Little);
        register("uintbe", PrimitiveKind::Integer { signed: false }, Endian::Big);
        register("uintle", PrimitiveKind::Integer { signed: false }, Endian::Little);
        register("nbcd", PrimitiveKind::Bcd, Endian::Little);
        register("nbcdbe", PrimitiveKind::Bcd, Endian::Big);
        register("nbcdle", PrimitiveKind::Bcd, Endian::Little);
        register("bytes", PrimitiveKind::Bytes, Endian::Big);
        register("bin", PrimitiveKind::Bits, Endian::Big);
        register("str", PrimitiveKind::FixedString, Endian::Big);
        register("strz", PrimitiveKind::TerminatedString, Endian::Big);
        Self { types }
    }

    pub fn get(&self, name: &str) -> Result<&PrimitiveType> {
        self.types
            .get(name)
            .ok_or_else(|| RomError::SchemaError(format!("unknown primitive type `{name}`")))
    }

    /// Registers a map-declared alias, e.g. a game-specific pointer type
    /// whose integer form is shifted by a fixed zero point before it is
    /// exposed as an address. The alias still decodes/encodes through the
    /// wrapped built-in; the shift itself is applied by the table engine
    /// (`Table`'s `zero_adjustment`), not here.
    pub fn register_alias(&mut self, name: impl Into<String>, wraps: &str) -> Result<()> {
        let base = self.get(wraps)?.clone();
        let name = name.into();
        self.types.insert(name.clone(), PrimitiveType { name, ..base });
        Ok(())
    }

    /// Registers a struct field's synthetic bitfield type under its
    /// `"{struct}.{field}"` name, so it decodes/encodes as a plain `Bits`
    /// primitive through the same path as every other field. The flag
    /// layout itself lives in `Schema::bitfields`, keyed by the same name.
    pub fn register_bitfield(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.types.insert(
            name.clone(),
            PrimitiveType { name, kind: PrimitiveKind::Bits, endian: Endian::Big },
        );
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_uint_le_round_trips() {
        let reg = TypeRegistry::with_builtins();
        let ty = reg.get("uintle").unwrap();
        let codec = TextCodec::ascii_with_terminator(vec![0]);
        let mut buf = [0u8; 2];
        ty.encode(&mut buf, 0, 16, &codec, &Value::UInt(0x1234)).unwrap();
        assert_eq!(buf, [0x34, 0x12]);
        let v = ty.decode(&buf, 0, 16, &codec).unwrap();
        assert_eq!(v, Value::UInt(0x1234));
    }

    #[test]
    fn alias_wraps_builtin() {
        let mut reg = TypeRegistry::with_builtins();
        reg.register_alias("pointer", "uintle").unwrap();
        let ty = reg.get("pointer").unwrap();
        assert_eq!(ty.name, "pointer");
        assert!(matches!(ty.kind, PrimitiveKind::Integer { signed: false }));
    }
}
