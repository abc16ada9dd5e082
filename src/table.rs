//! Tables: lazy per-index materialisation, direct or pointer-indexed.
//! Grounded on `id0/entry_iter.rs`'s lazy
//! slice-splitting iterators and `id0/segment.rs`'s "read a sequence of
//! fixed records off a buffer" shape.

use crate::bitstream::{BitRead, Endian};
use crate::codec::Value;
use crate::error::{Result, RomError};
use crate::rom::Rom;
use crate::schema::table_def::{ElementKind, TableDef};
use crate::structure::StructInstance;

#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    pub def: &'a TableDef,
}

impl<'a> Table<'a> {
    pub fn new(def: &'a TableDef) -> Self {
        Self { def }
    }

    pub fn len(&self) -> u32 {
        self.def.count
    }

    pub fn is_empty(&self) -> bool {
        self.def.count == 0
    }

    /// Absolute (file-relative) bit offset of item `index`:
    /// `offset + N*stride` for direct tables, `offset + index[N]` for
    /// pointer-indexed ones.
    pub fn item_base_bits(&self, rom: &Rom, index: u32) -> Result<u64> {
        if index >= self.def.count {
            return Err(RomError::OutOfBounds {
                offset: index as u64,
                width: 0,
                buffer_len: rom.bytes().len(),
            });
        }
        let header_bits = rom.schema.meta.header_len * 8;
        if let Some(stride) = self.def.stride_bytes {
            return Ok(header_bits + (self.def.offset_bytes + (index as u64) * (stride as u64)) * 8);
        }
        let index_table_id = self.def.index_table_id.as_ref().ok_or_else(|| {
            RomError::SchemaError(format!("table `{}` is neither direct nor indexed", self.def.name))
        })?;
        let index_table = rom.schema.table_by_id(index_table_id)?;
        let pointer_table = Table::new(index_table);
        let pointer_stride = index_table.stride_bytes.ok_or_else(|| {
            RomError::SchemaError(format!(
                "index table `{}` must itself be a direct, fixed-stride table",
                index_table.name
            ))
        })?;
        let ptr_bits = pointer_table.item_base_bits(rom, index)?;
        let raw_ptr = rom.bytes().read_raw_uint(ptr_bits, pointer_stride * 8, Endian::Little)?;
        let adjusted = raw_ptr as i64 + self.def.zero_adjustment;
        let abs_offset_bytes = self.def.offset_bytes as i64 + adjusted;
        let image_len = rom.bytes().len() as i64;
        if abs_offset_bytes < 0 || abs_offset_bytes >= image_len {
            let policy_err = RomError::PointerOutOfRange {
                table: self.def.name.clone(),
                value: raw_ptr,
            };
            if rom.strict() {
                return Err(policy_err);
            }
            log::warn!("{policy_err}");
        }
        Ok((abs_offset_bytes.max(0) as u64) * 8)
    }

    pub fn struct_instance<'b>(&self, rom: &'b Rom, index: u32) -> Result<StructInstance<'b>> {
        let base_bits = self.item_base_bits(rom, index)?;
        match rom.schema.element_kind(&self.def.type_name)? {
            ElementKind::Struct(name) => {
                let def = rom.schema.struct_def(&name)?;
                Ok(StructInstance::new(def, base_bits))
            }
            ElementKind::Primitive(name) => Err(RomError::SchemaError(format!(
                "table `{}` holds primitive type `{name}`, not a struct",
                self.def.name
            ))),
        }
    }

    /// Reads a primitive-typed table's raw row value (used for index
    /// tables and standalone primitive tables).
    pub fn primitive_value(&self, rom: &Rom, index: u32) -> Result<Value> {
        let base_bits = self.item_base_bits(rom, index)?;
        match rom.schema.element_kind(&self.def.type_name)? {
            ElementKind::Primitive(name) => {
                let ty = rom.schema.types.get(&name)?;
                let codec = rom.schema.codec(None)?;
                let width = self.def.stride_bytes.map(|s| s * 8).ok_or_else(|| {
                    RomError::SchemaError(format!("table `{}` has no fixed element width", self.def.name))
                })?;
                ty.decode(rom.bytes(), base_bits, width, codec)
            }
            ElementKind::Struct(name) => Err(RomError::SchemaError(format!(
                "table `{}` holds struct type `{name}`, not a primitive",
                self.def.name
            ))),
        }
    }
}
