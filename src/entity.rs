//! Entities: pure, `Rom`-independent helpers for mapping an entity's
//! joined tables to TSV column names and back. `Rom` (in `rom.rs`) owns
//! the I/O; this module owns the naming and disambiguation rules,
//! grounded on this codebase's `til/union.rs` member combination shape.

use std::collections::HashMap;

use crate::error::{Result, RomError};
use crate::schema::entity_def::EntityDef;
use crate::schema::field::Field;
use crate::schema::Schema;

/// A single TSV column, naming which table/field it came from and what it
/// is displayed as. Columns here only cover struct-typed member tables;
/// joining a primitive-typed table into an entity is out of scope.
#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub table_id: String,
    pub field_name: String,
    pub display_name: String,
}

/// Builds the column list for an entity: one column per field across its
/// member tables' struct definitions, duplicate field names disambiguated
/// by suffixing the owning table id.
pub fn columns(schema: &Schema, entity: &EntityDef) -> Result<Vec<ColumnRef>> {
    let mut occurrences: HashMap<String, u32> = HashMap::new();
    let mut table_fields: Vec<(String, &Field)> = Vec::new();
    for table_id in &entity.table_ids {
        let table = schema.table_by_id(table_id)?;
        let struct_name = match schema.element_kind(&table.type_name)? {
            crate::schema::table_def::ElementKind::Struct(name) => name,
            crate::schema::table_def::ElementKind::Primitive(_) => {
                return Err(RomError::SchemaError(format!(
                    "entity `{}` joins primitive-typed table `{}`, which is unsupported",
                    entity.name, table.name
                )))
            }
        };
        let def = schema.struct_def(&struct_name)?;
        for field in &def.fields {
            *occurrences.entry(field.name.clone()).or_insert(0) += 1;
            table_fields.push((table_id.clone(), field));
        }
    }
    Ok(table_fields
        .into_iter()
        .map(|(table_id, field)| {
            let display_name = if occurrences[&field.name] > 1 {
                format!("{}@{}", field.name, table_id)
            } else {
                field.name.clone()
            };
            ColumnRef { table_id, field_name: field.name.clone(), display_name }
        })
        .collect())
}

pub fn column_by_display_name<'a>(columns: &'a [ColumnRef], display_name: &str) -> Result<&'a ColumnRef> {
    columns
        .iter()
        .find(|c| c.display_name == display_name)
        .ok_or_else(|| RomError::SchemaError(format!("entity has no column `{display_name}`")))
}

/// Picks the field used as an entity's row name: the first field literally
/// named `name` (case-insensitive), falling back to the first text-typed
/// field. `entities.tsv` never names this column explicitly; it is
/// resolved structurally instead.
pub fn name_field(schema: &Schema, entity: &EntityDef) -> Result<(String, String)> {
    let table_id = entity.name_table_id().to_string();
    let table = schema.table_by_id(&table_id)?;
    let struct_name = match schema.element_kind(&table.type_name)? {
        crate::schema::table_def::ElementKind::Struct(name) => name,
        crate::schema::table_def::ElementKind::Primitive(_) => {
            return Err(RomError::SchemaError(format!(
                "entity `{}`'s name-source table `{}` is not struct-typed",
                entity.name, table.name
            )))
        }
    };
    let def = schema.struct_def(&struct_name)?;
    let field = def
        .fields
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case("name"))
        .or_else(|| def.fields.iter().find(|f| f.type_name == "str" || f.type_name == "strz"))
        .ok_or_else(|| RomError::SchemaError(format!(
            "entity `{}` has no name-bearing field in its name-source table",
            entity.name
        )))?;
    Ok((table_id, field.name.clone()))
}
