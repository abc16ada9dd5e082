//! Tables.

#[derive(Debug, Clone)]
pub struct TableDef {
    pub id: String,
    pub name: String,
    /// Raw `type` column: either a declared struct name or a primitive
    /// type registry name. Resolved against the schema once every struct
    /// and table has been loaded (`Schema::element_kind`).
    pub type_name: String,
    pub offset_bytes: u64,
    pub count: u32,
    /// `None` for indexed tables, where each item's position comes from
    /// the index table instead of a fixed stride.
    pub stride_bytes: Option<u32>,
    /// Id of another, primitive-typed `TableDef` holding the pointers.
    pub index_table_id: Option<String>,
    /// Added to each raw pointer value before it is used as an offset,
    /// so ROM-address and file-offset pointers can coexist. Not a
    /// required `tables.tsv` column; this crate reads it from an optional
    /// trailing `zero_adjustment` column, defaulting to 0 when the column
    /// or file is absent.
    pub zero_adjustment: i64,
    pub comment: String,
}

impl TableDef {
    pub fn item_offset_bytes(&self, index: u32) -> Option<u64> {
        let stride = self.stride_bytes?;
        Some(self.offset_bytes + (index as u64) * (stride as u64))
    }
}

/// What a table's rows are made of, once `type_name` has been resolved
/// against the schema's struct and primitive registries.
#[derive(Debug, Clone)]
pub enum ElementKind {
    Struct(String),
    Primitive(String),
}
