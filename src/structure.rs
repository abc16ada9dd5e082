//! Struct instances: a compiled `StructDef` bound to a base bit offset.
//! The instance does not own or borrow the byte buffer directly — every
//! accessor takes `&Rom`/`&mut Rom` as an explicit handle, mirroring this
//! codebase's pattern of threading `impl IdaGenericBufUnpack` readers
//! through every `*Raw::read` call instead of owning one.

use crate::codec::Value;
use crate::error::{Result, RomError};
use crate::rom::Rom;
use crate::schema::field::{Field, Origin};
use crate::schema::struct_def::StructDef;

#[derive(Debug, Clone, Copy)]
pub struct StructInstance<'a> {
    pub def: &'a StructDef,
    pub base_bits: u64,
}

impl<'a> StructInstance<'a> {
    pub fn new(def: &'a StructDef, base_bits: u64) -> Self {
        Self { def, base_bits }
    }

    pub fn field_abs_bits(&self, rom: &Rom, field: &Field) -> u64 {
        match field.origin {
            Origin::Parent => self.base_bits + field.offset_bits,
            Origin::Root => rom.schema.meta.header_len * 8 + field.offset_bits,
        }
    }

    fn field(&self, name: &str) -> Result<&'a Field> {
        self.def.field(name).ok_or_else(|| {
            RomError::SchemaError(format!("struct `{}` has no field `{name}`", self.def.name))
        })
    }

    /// Optional trailing fields that read as `OutOfBounds` come back as
    /// `Ok(None)`; every other error propagates.
    pub fn get(&self, rom: &Rom, field_name: &str) -> Result<Option<Value>> {
        let field = self.field(field_name)?;
        let ty = rom.schema.types.get(&field.type_name)?;
        let codec = rom.schema.codec(None)?;
        let abs_bits = self.field_abs_bits(rom, field);
        match ty.decode(rom.bytes(), abs_bits, field.size_bits, codec) {
            Ok(value) => Ok(Some(value)),
            Err(err) if field.optional && matches!(err, RomError::OutOfBounds { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Writing an optional field is a no-op when `value` is `None`.
    /// Overflow/bounds are checked before any bit is touched, since every
    /// `bitstream` writer validates before it writes.
    pub fn set(&self, rom: &mut Rom, field_name: &str, value: Option<Value>) -> Result<()> {
        let field = self.field(field_name)?.clone();
        let Some(value) = value else {
            return Ok(());
        };
        let abs_bits = self.field_abs_bits(rom, &field);
        let codec = rom.schema.codec(None)?.clone();
        let ty = rom.schema.types.get(&field.type_name)?.clone();
        ty.encode(rom.bytes_mut(), abs_bits, field.size_bits, &codec, &value)
            .map_err(|err| match err {
                RomError::ValueOverflow { value, width, .. } => {
                    RomError::ValueOverflow { field: field.name.clone(), value, width }
                }
                other => other,
            })
    }

    /// Two struct instances are equal iff every field's decoded value is
    /// equal, not iff their backing bytes are equal — padding and
    /// don't-care bits never participate.
    pub fn values_equal(&self, rom: &Rom, other: &StructInstance, other_rom: &Rom) -> Result<bool> {
        for field in &self.def.fields {
            if self.get(rom, &field.name)? != other.get(other_rom, &field.name)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
