//! The declarative map, compiled into a runtime schema. Map-scoped,
//! never global, so separately loaded maps never share state.

pub mod bitfield_def;
pub mod entity_def;
pub mod enum_def;
pub mod field;
pub mod loader;
pub mod struct_def;
pub mod table_def;

use std::collections::HashMap;

use crate::codec::text::TextCodec;
use crate::codec::TypeRegistry;
use crate::error::{Result, RomError};
use bitfield_def::BitfieldDef;
use entity_def::EntityDef;
use enum_def::EnumDef;
use struct_def::StructDef;
use table_def::{ElementKind, TableDef};

#[derive(Debug, Clone, Default)]
pub struct RomMeta {
    pub name: String,
    pub size: Option<u64>,
    pub sha1: Option<String>,
    pub map_version: String,
    /// Bytes stripped off the front of the image before ROM offset 0.
    pub header_len: u64,
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub meta: RomMeta,
    pub types: TypeRegistry,
    pub structs: HashMap<String, StructDef>,
    pub bitfields: HashMap<String, BitfieldDef>,
    pub enums: HashMap<String, EnumDef>,
    pub tables: HashMap<String, TableDef>,
    pub entities: Vec<EntityDef>,
    pub codecs: HashMap<String, TextCodec>,
    default_codec: TextCodec,
}

impl Schema {
    pub fn new(meta: RomMeta, types: TypeRegistry) -> Self {
        Self {
            meta,
            types,
            structs: HashMap::new(),
            bitfields: HashMap::new(),
            enums: HashMap::new(),
            tables: HashMap::new(),
            entities: Vec::new(),
            codecs: HashMap::new(),
            default_codec: TextCodec::ascii_with_terminator(vec![0x00]),
        }
    }

    pub fn codec(&self, name: Option<&str>) -> Result<&TextCodec> {
        match name {
            None => Ok(&self.default_codec),
            Some(name) => self
                .codecs
                .get(name)
                .ok_or_else(|| RomError::SchemaError(format!("unknown codec `{name}`"))),
        }
    }

    pub fn table_by_id(&self, id: &str) -> Result<&TableDef> {
        self.tables
            .get(id)
            .ok_or_else(|| RomError::SchemaError(format!("unknown table id `{id}`")))
    }

    pub fn table_by_name(&self, name: &str) -> Result<&TableDef> {
        self.tables
            .values()
            .find(|t| t.name == name)
            .ok_or_else(|| RomError::SchemaError(format!("unknown table `{name}`")))
    }

    pub fn struct_def(&self, name: &str) -> Result<&StructDef> {
        self.structs
            .get(name)
            .ok_or_else(|| RomError::SchemaError(format!("unknown struct `{name}`")))
    }

    pub fn enum_def(&self, name: &str) -> Result<&EnumDef> {
        self.enums
            .get(name)
            .ok_or_else(|| RomError::SchemaError(format!("unknown enum `{name}`")))
    }

    pub fn entity(&self, name: &str) -> Result<&EntityDef> {
        self.entities
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| RomError::SchemaError(format!("unknown entity `{name}`")))
    }

    /// Resolves a table's `type` column against the struct namespace
    /// first, falling back to the primitive type registry — tables may be
    /// either directly struct-typed or primitive-typed.
    pub fn element_kind(&self, type_name: &str) -> Result<ElementKind> {
        if self.structs.contains_key(type_name) {
            return Ok(ElementKind::Struct(type_name.to_string()));
        }
        self.types.get(type_name)?;
        Ok(ElementKind::Primitive(type_name.to_string()))
    }
}
