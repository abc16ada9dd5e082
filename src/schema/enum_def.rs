//! Enums: a bijective mapping from integer value to
//! symbolic name on its defined domain; values outside the domain pass
//! through as plain integers. Grounded on this codebase's `til::enum::Enum`
//! member-list shape, simplified since this crate's enums are always
//! data-driven (no typedef/ref indirection).

use std::collections::HashMap;

use crate::error::{Result, RomError};

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    value_to_name: HashMap<i64, String>,
    name_to_value: HashMap<String, i64>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, members: Vec<(i64, String)>) -> Result<Self> {
        let name = name.into();
        let mut value_to_name = HashMap::new();
        let mut name_to_value = HashMap::new();
        for (value, member_name) in members {
            if let Some(existing) = value_to_name.insert(value, member_name.clone()) {
                return Err(RomError::SchemaError(format!(
                    "enum `{name}` redefines value {value} (was `{existing}`)"
                )));
            }
            if let Some(existing) = name_to_value.insert(member_name.clone(), value) {
                return Err(RomError::SchemaError(format!(
                    "enum `{name}` redefines name `{member_name}` (was {existing})"
                )));
            }
        }
        Ok(Self { name, value_to_name, name_to_value })
    }

    /// Renders a value as its symbolic name if defined, else the raw integer.
    pub fn render(&self, value: i64) -> String {
        self.value_to_name
            .get(&value)
            .cloned()
            .unwrap_or_else(|| value.to_string())
    }

    /// Parses text back to a value: a known name resolves to its value;
    /// otherwise the text must parse as a plain integer (a value outside
    /// the enum's domain, which is allowed to pass through).
    pub fn parse(&self, text: &str) -> Result<i64> {
        if let Some(&value) = self.name_to_value.get(text) {
            return Ok(value);
        }
        text.parse::<i64>().map_err(|_| {
            RomError::SchemaError(format!("`{text}` is not a member of enum `{}` nor an integer", self.name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_value_passes_through() {
        let def = EnumDef::new("e", vec![(0, "Zero".into()), (1, "One".into())]).unwrap();
        assert_eq!(def.render(0), "Zero");
        assert_eq!(def.render(5), "5");
        assert_eq!(def.parse("One").unwrap(), 1);
        assert_eq!(def.parse("5").unwrap(), 5);
    }
}
