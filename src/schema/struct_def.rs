//! Compiled struct layouts.

use crate::error::{Result, RomError};
use crate::schema::field::Field;

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<Field>,
    /// `None` when the struct ends in a terminated-string field: its size
    /// is only known once the bytes are read, so tables built from such a
    /// struct must be pointer-indexed rather than fixed-stride.
    pub total_size_bits: Option<u32>,
}

impl StructDef {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name, &fields)?;
        let total_size_bits = fields.last().and_then(|last| {
            if last.size_bits == 0 && !fields.is_empty() {
                None
            } else {
                Some(last.end_bits() as u32)
            }
        });
        Ok(Self { name, fields, total_size_bits })
    }

    /// Checks the monotonic-offset / no-aliasing invariant, allowing
    /// overlap only between fields sharing the same `union_group`.
    fn validate(name: &str, fields: &[Field]) -> Result<()> {
        let parent_fields: Vec<&Field> = fields
            .iter()
            .filter(|f| f.origin == crate::schema::field::Origin::Parent)
            .collect();
        let mut sorted = parent_fields.clone();
        sorted.sort_by_key(|f| f.offset_bits);
        for window in sorted.windows(2) {
            let [a, b] = window else { unreachable!() };
            if a.end_bits() > b.offset_bits {
                return Err(RomError::SchemaError(format!(
                    "struct `{name}`: fields `{}` and `{}` overlap without a declared union",
                    a.name, b.name
                )));
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::{Display, Origin};

    fn field(name: &str, offset: u64, size: u32) -> Field {
        Field {
            id: name.into(),
            name: name.into(),
            type_name: "uint".into(),
            offset_bits: offset,
            size_bits: size,
            origin: Origin::Parent,
            reference: None,
            display: Display::Default,
            optional: false,
            comment: String::new(),
        }
    }

    #[test]
    fn rejects_overlapping_fields() {
        let fields = vec![field("a", 0, 16), field("b", 8, 8)];
        assert!(StructDef::new("s", fields).is_err());
    }

    #[test]
    fn accepts_contiguous_fields() {
        let fields = vec![field("a", 0, 8), field("b", 8, 8)];
        let def = StructDef::new("s", fields).unwrap();
        assert_eq!(def.total_size_bits, Some(16));
    }
}
