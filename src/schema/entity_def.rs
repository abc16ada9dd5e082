//! Entities: a named join of one or more tables by row index.

use crate::error::{Result, RomError};

#[derive(Debug, Clone)]
pub struct EntityDef {
    pub name: String,
    /// Ids of the joined tables, in `entities.tsv` declaration order.
    /// `entities.tsv` only has a `name, tables` column pair, with no
    /// separate "which table names the row" column, so by convention the
    /// first listed table is the name source.
    pub table_ids: Vec<String>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>, table_ids: Vec<String>) -> Result<Self> {
        let name = name.into();
        if table_ids.is_empty() {
            return Err(RomError::SchemaError(format!(
                "entity `{name}` joins zero tables"
            )));
        }
        Ok(Self { name, table_ids })
    }

    pub fn name_table_id(&self) -> &str {
        &self.table_ids[0]
    }
}
