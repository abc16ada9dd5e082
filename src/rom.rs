//! The loaded ROM image: schema plus two byte buffers (the untouched
//! original and the working copy) and the cross-reference name index built
//! during an entity load. Per the "explicit handle" design note, every
//! other component (`Table`, `StructInstance`, `tsv`) takes `&Rom`/`&mut
//! Rom` rather than embedding a buffer of its own — this is the one place
//! that owns the bytes.

use std::collections::HashMap;
use std::path::Path;

use crate::codec::{PrimitiveKind, Value};
use crate::entity;
use crate::error::{Result, RomError};
use crate::patch::Patch;
use crate::schema::entity_def::EntityDef;
use crate::schema::field::{Display, Field, Origin, Reference};
use crate::schema::table_def::{ElementKind, TableDef};
use crate::schema::Schema;
use crate::structure::StructInstance;
use crate::table::Table;

pub struct Rom {
    pub schema: Schema,
    bytes: Vec<u8>,
    original_bytes: Vec<u8>,
    strict: bool,
    /// `table_id -> (row name -> row index)`, populated by
    /// `index_entity_names_from_text` ahead of any cross-reference parse.
    name_index: HashMap<String, HashMap<String, u32>>,
}

impl Rom {
    pub fn new(schema: Schema, bytes: Vec<u8>, strict: bool) -> Self {
        Self { schema, original_bytes: bytes.clone(), bytes, strict, name_index: HashMap::new() }
    }

    pub fn open(schema: Schema, path: &Path, strict: bool) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        if let Some(expected) = schema.meta.size {
            if bytes.len() as u64 != expected {
                log::warn!(
                    "{} is {} bytes, map declares {expected}",
                    path.display(),
                    bytes.len()
                );
            }
        }
        Ok(Self::new(schema, bytes, strict))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn original_bytes(&self) -> &[u8] {
        &self.original_bytes
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn table(&self, id: &str) -> Result<Table<'_>> {
        Ok(Table::new(self.schema.table_by_id(id)?))
    }

    /// Follows a table-referencing field by hand: row `index` of table
    /// `table_id`, as a struct instance ready for further field reads.
    pub fn dereference(&self, table_id: &str, index: u32) -> Result<StructInstance<'_>> {
        self.table(table_id)?.struct_instance(self, index)
    }

    /// Minimal byte-level diff against an arbitrary buffer (normally an
    /// earlier snapshot of the same image).
    pub fn diff(&self, other: &[u8]) -> Patch {
        Patch::diff(other, &self.bytes)
    }

    /// Diff against the unmodified image this `Rom` was opened with.
    pub fn diff_against_original(&self) -> Patch {
        Patch::diff(&self.original_bytes, &self.bytes)
    }

    pub fn apply_patch(&mut self, patch: &Patch) -> Result<()> {
        patch.apply(&mut self.bytes)
    }

    // -- entity dump/load --------------------------------------------------

    pub fn entity_columns(&self, entity: &EntityDef) -> Result<Vec<String>> {
        Ok(entity::columns(&self.schema, entity)?
            .into_iter()
            .map(|c| c.display_name)
            .collect())
    }

    pub fn entity_row_count(&self, entity: &EntityDef) -> Result<u32> {
        Ok(self.schema.table_by_id(entity.name_table_id())?.count)
    }

    fn entity_column(&self, entity: &EntityDef, display_name: &str) -> Result<entity::ColumnRef> {
        let columns = entity::columns(&self.schema, entity)?;
        entity::column_by_display_name(&columns, display_name).cloned()
    }

    fn field_for_column(&self, col: &entity::ColumnRef) -> Result<Field> {
        let table = self.schema.table_by_id(&col.table_id)?;
        let struct_name = match self.schema.element_kind(&table.type_name)? {
            ElementKind::Struct(name) => name,
            ElementKind::Primitive(name) => {
                return Err(RomError::SchemaError(format!(
                    "table `{}` holds primitive type `{name}`, not a struct",
                    table.name
                )))
            }
        };
        self.schema
            .struct_def(&struct_name)?
            .field(&col.field_name)
            .cloned()
            .ok_or_else(|| RomError::SchemaError(format!(
                "struct `{struct_name}` has no field `{}`",
                col.field_name
            )))
    }

    /// Renders one entity field to its TSV text form. Cross-references
    /// render as the target entity's name when one exists for the target
    /// table, and as a plain row index otherwise.
    pub fn render_entity_field(&self, entity: &EntityDef, index: u32, display_name: &str) -> Result<String> {
        let col = self.entity_column(entity, display_name)?;
        let field = self.field_for_column(&col)?;
        let table = self.schema.table_by_id(&col.table_id)?.clone();
        let instance = Table::new(&table).struct_instance(self, index)?;
        let Some(value) = instance.get(self, &field.name)? else {
            return Ok(String::new());
        };
        self.render_value(&field, &value)
    }

    fn render_value(&self, field: &Field, value: &Value) -> Result<String> {
        match &field.reference {
            Some(Reference::Enum(name)) => Ok(self.schema.enum_def(name)?.render(as_i64(value)?)),
            Some(Reference::Table(target_table_id)) => {
                let row = as_i64(value)? as u32;
                match self.naming_entity_for_table(target_table_id) {
                    Some(naming_entity) => {
                        let (name_table_id, name_field) = entity::name_field(&self.schema, naming_entity)?;
                        let name_table = self.schema.table_by_id(&name_table_id)?.clone();
                        let row_instance = Table::new(&name_table).struct_instance(self, row)?;
                        match row_instance.get(self, &name_field)? {
                            Some(Value::Text(text)) => Ok(text),
                            _ => Ok(row.to_string()),
                        }
                    }
                    None => Ok(row.to_string()),
                }
            }
            None => {
                if let Some(bitfield) = self.schema.bitfields.get(&field.type_name) {
                    let Value::Bits(bits) = value else {
                        return Err(RomError::SchemaError(format!(
                            "field `{}` declares bitfield `{}` but decoded a non-bit value",
                            field.name, bitfield.name
                        )));
                    };
                    return Ok(bitfield.render(bits));
                }
                Ok(render_plain(field, value))
            }
        }
    }

    fn naming_entity_for_table(&self, table_id: &str) -> Option<&crate::schema::entity_def::EntityDef> {
        self.schema.entities.iter().find(|e| e.name_table_id() == table_id)
    }

    /// Pass 1 of a directory load: records every row's name-column text for
    /// `entity`'s name-source table, without touching any bytes. Must run,
    /// for every entity being loaded, before any entity's fields are parsed
    /// — so renaming a row and updating a reference to the new name in the
    /// same load resolves correctly regardless of load order.
    pub fn index_entity_names_from_text(&mut self, entity: &EntityDef, text: &str) -> Result<()> {
        let (table_id, name_field) = entity::name_field(&self.schema, entity)?;
        let display_name = {
            let columns = entity::columns(&self.schema, entity)?;
            columns
                .iter()
                .find(|c| c.table_id == table_id && c.field_name == name_field)
                .map(|c| c.display_name.clone())
                .ok_or_else(|| RomError::SchemaError(format!(
                    "entity `{}` has no column for its own name field",
                    entity.name
                )))?
        };
        let records = crate::tsv::parse_records(text);
        let mut names = HashMap::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            if let Some(name) = record.get(&display_name) {
                names.insert(name.clone(), index as u32);
            }
        }
        self.name_index.insert(table_id, names);
        Ok(())
    }

    /// Pass 1 fallback for a single-entity load with no sibling entities in
    /// flight: builds the name index from the ROM's current contents.
    pub fn index_entity_names_from_rom(&mut self, entity: &EntityDef) -> Result<()> {
        let (table_id, name_field) = entity::name_field(&self.schema, entity)?;
        let table = self.schema.table_by_id(&table_id)?.clone();
        let row_count = table.count;
        let mut names = HashMap::with_capacity(row_count as usize);
        for index in 0..row_count {
            let instance = Table::new(&table).struct_instance(self, index)?;
            if let Some(Value::Text(name)) = instance.get(self, &name_field)? {
                names.insert(name, index);
            }
        }
        self.name_index.insert(table_id, names);
        Ok(())
    }

    fn resolve_reference(&self, table_id: &str, text: &str) -> Result<u32> {
        if let Some(names) = self.name_index.get(table_id) {
            if let Some(&index) = names.get(text) {
                return Ok(index);
            }
        }
        text.parse::<u32>()
            .map_err(|_| RomError::UnknownReference { table: table_id.to_string(), name: text.to_string() })
    }

    /// Parses one TSV cell into a typed value, ready to hand to
    /// [`Rom::write_entity_field`]. Does not touch any bytes, so a whole
    /// directory's worth of rows can be parsed and validated before the
    /// first one is written.
    pub fn parse_entity_field(&self, entity: &EntityDef, display_name: &str, text: &str) -> Result<Value> {
        let col = self.entity_column(entity, display_name)?;
        let field = self.field_for_column(&col)?;
        match &field.reference {
            Some(Reference::Enum(name)) => {
                let value = self.schema.enum_def(name)?.parse(text)?;
                self.wrap_integer(&field, value)
            }
            Some(Reference::Table(table_id)) => {
                let index = self.resolve_reference(table_id, text)?;
                self.wrap_integer(&field, index as i64)
            }
            None => {
                if let Some(bitfield) = self.schema.bitfields.get(&field.type_name) {
                    return Ok(Value::Bits(bitfield.parse(text)?));
                }
                self.parse_plain(&field, text)
            }
        }
    }

    fn wrap_integer(&self, field: &Field, value: i64) -> Result<Value> {
        match self.schema.types.get(&field.type_name)?.kind {
            PrimitiveKind::Integer { signed: true } => Ok(Value::Int(value)),
            PrimitiveKind::Integer { signed: false } | PrimitiveKind::Bcd => Ok(Value::UInt(value as u64)),
            _ => Err(RomError::SchemaError(format!(
                "field `{}` has a reference but is not an integer type",
                field.name
            ))),
        }
    }

    fn parse_plain(&self, field: &Field, text: &str) -> Result<Value> {
        match self.schema.types.get(&field.type_name)?.kind {
            PrimitiveKind::Integer { signed: true } => Ok(Value::Int(parse_integer(text)?)),
            PrimitiveKind::Integer { signed: false } => Ok(Value::UInt(parse_integer(text)? as u64)),
            PrimitiveKind::Bcd => Ok(Value::UInt(parse_integer(text)? as u64)),
            PrimitiveKind::Bytes => Ok(Value::Bytes(parse_hex_bytes(text)?)),
            PrimitiveKind::Bits => Ok(Value::Bits(crate::bitstream::BitArray::from_u64(
                parse_integer(text)? as u64,
                field.size_bits as usize,
            ))),
            PrimitiveKind::FixedString | PrimitiveKind::TerminatedString => Ok(Value::Text(text.to_string())),
        }
    }

    /// Writes one already-parsed value into the ROM's working buffer.
    pub fn write_entity_field(&mut self, entity: &EntityDef, index: u32, display_name: &str, value: Value) -> Result<()> {
        let col = self.entity_column(entity, display_name)?;
        let field = self.field_for_column(&col)?;
        let table: TableDef = self.schema.table_by_id(&col.table_id)?.clone();
        let base_bits = Table::new(&table).item_base_bits(self, index)?;
        let abs_bits = match field.origin {
            Origin::Parent => base_bits + field.offset_bits,
            Origin::Root => self.schema.meta.header_len * 8 + field.offset_bits,
        };
        let codec = self.schema.codec(None)?.clone();
        let ty = self.schema.types.get(&field.type_name)?.clone();
        ty.encode(self.bytes_mut(), abs_bits, field.size_bits, &codec, &value)
            .map_err(|err| match err {
                RomError::ValueOverflow { value, width, .. } => {
                    RomError::ValueOverflow { field: field.name.clone(), value, width }
                }
                other => other,
            })
    }

    /// Dumps every declared entity to `<dir>/<entity>.tsv`. Per-cell
    /// overflow/pointer problems are logged and rendered empty rather than
    /// aborting the whole dump — dumping is lossy-tolerant, building is
    /// strict.
    pub fn dump(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        for entity in &self.schema.entities {
            let text = crate::tsv::render_entity(self, entity)?;
            std::fs::write(dir.join(format!("{}.tsv", entity.name)), text)?;
        }
        Ok(())
    }

    /// Loads every `<dir>/<entity>.tsv` present back into the working
    /// buffer. All entities are name-indexed and every cell parsed (and
    /// hence every `UnparseableValue` caught) before any byte is written.
    /// Writing itself can still fail on `ValueOverflow`/`PointerOutOfRange`
    /// mid-batch (width checks happen at encode time, against the specific
    /// bit offset being written, not during parsing); if that happens the
    /// working buffer is restored to exactly what it was before this call,
    /// so a failed load never leaves a partially-applied edit behind.
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        let mut texts = Vec::new();
        for entity in &self.schema.entities {
            let path = dir.join(format!("{}.tsv", entity.name));
            if path.exists() {
                texts.push((entity.clone(), std::fs::read_to_string(&path)?));
            }
        }
        for (entity, text) in &texts {
            self.index_entity_names_from_text(entity, text)?;
        }
        let mut writes = Vec::new();
        for (entity, text) in &texts {
            let records = crate::tsv::parse_records(text);
            for (row_index, record) in records.iter().enumerate() {
                for (column, cell) in record {
                    let value = self
                        .parse_entity_field(entity, column, cell)
                        .map_err(|err| match err {
                            RomError::SchemaError(detail) => RomError::UnparseableValue {
                                row: row_index,
                                column: column.clone(),
                                detail,
                            },
                            other => other,
                        })?;
                    writes.push((entity.clone(), row_index as u32, column.clone(), value));
                }
            }
        }
        let backup = self.bytes.clone();
        for (entity, index, column, value) in writes {
            if let Err(err) = self.write_entity_field(&entity, index, &column, value) {
                self.bytes = backup;
                return Err(err);
            }
        }
        Ok(())
    }
}

fn as_i64(value: &Value) -> Result<i64> {
    match value {
        Value::Int(v) => Ok(*v),
        Value::UInt(v) => Ok(*v as i64),
        other => Err(RomError::SchemaError(format!("{other:?} is not an integer value"))),
    }
}

fn render_plain(field: &Field, value: &Value) -> String {
    match value {
        Value::Int(v) => match field.display {
            Display::Hex => format!("0x{v:X}"),
            _ => v.to_string(),
        },
        Value::UInt(v) => match field.display {
            Display::Hex => format!("0x{v:X}"),
            _ => v.to_string(),
        },
        Value::Bytes(bytes) => bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" "),
        Value::Bits(bits) => format!("0x{:X}", bits.to_u64()),
        Value::Text(text) => text.clone(),
    }
}

fn parse_integer(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let magnitude = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        rest.parse::<i64>()
    }
    .map_err(|_| RomError::SchemaError(format!("`{text}` is not a valid integer")))?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_hex_bytes(text: &str) -> Result<Vec<u8>> {
    text.split_whitespace()
        .map(|token| {
            u8::from_str_radix(token, 16)
                .map_err(|_| RomError::SchemaError(format!("`{token}` is not a hex byte")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TypeRegistry;
    use crate::schema::field::{Display, Origin};
    use crate::schema::struct_def::StructDef;
    use crate::schema::table_def::TableDef;
    use crate::schema::{RomMeta, Schema};

    fn name_field(name: &str, offset: u64, size: u32, type_name: &str) -> Field {
        Field {
            id: name.into(),
            name: name.into(),
            type_name: type_name.into(),
            offset_bits: offset,
            size_bits: size,
            origin: Origin::Parent,
            reference: None,
            display: Display::Default,
            optional: false,
            comment: String::new(),
        }
    }

    fn build_schema() -> Schema {
        let mut schema = Schema::new(RomMeta { name: "test".into(), ..Default::default() }, TypeRegistry::with_builtins());
        let monster = StructDef::new(
            "Monster",
            vec![name_field("hp", 0, 8, "uint"), name_field("name", 8, 64, "str")],
        )
        .unwrap();
        schema.structs.insert("Monster".into(), monster);
        schema.tables.insert(
            "monsters".into(),
            TableDef {
                id: "monsters".into(),
                name: "Monsters".into(),
                type_name: "Monster".into(),
                offset_bytes: 0,
                count: 2,
                stride_bytes: Some(9),
                index_table_id: None,
                zero_adjustment: 0,
                comment: String::new(),
            },
        );
        schema.entities.push(
            crate::schema::entity_def::EntityDef::new("monsters", vec!["monsters".into()]).unwrap(),
        );
        schema
    }

    #[test]
    fn dumps_and_reloads_a_round_trip() {
        let schema = build_schema();
        let mut bytes = vec![0u8; 18];
        bytes[0] = 10;
        bytes[1..9].copy_from_slice(b"Goblin\0\0");
        bytes[9] = 20;
        bytes[10..18].copy_from_slice(b"Orc\0\0\0\0\0");
        let mut rom = Rom::new(schema, bytes, true);

        let dir = std::env::temp_dir().join(format!("romtool-test-{:p}", &rom));
        rom.dump(&dir).unwrap();
        let text = std::fs::read_to_string(dir.join("monsters.tsv")).unwrap();
        assert!(text.contains("Goblin"));

        rom.write_entity_field(
            &rom.schema.entities[0].clone(),
            0,
            "hp",
            Value::UInt(99),
        )
        .unwrap();
        assert_eq!(rom.bytes()[0], 99);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unknown_reference_name_is_an_error() {
        let schema = build_schema();
        let rom = Rom::new(schema, vec![0u8; 18], true);
        let err = rom.resolve_reference("monsters", "Nonexistent").unwrap_err();
        assert!(matches!(err, RomError::UnknownReference { .. }));
    }

    #[test]
    fn numeric_fallback_resolves_when_not_named() {
        let schema = build_schema();
        let rom = Rom::new(schema, vec![0u8; 18], true);
        assert_eq!(rom.resolve_reference("monsters", "1").unwrap(), 1);
    }
}
