//! Reads a map directory into a compiled [`Schema`]: `rom.tsv`,
//! `structs/*.tsv`, `tables.tsv`, `enums/*.tsv`, `codecs/*.tbl`,
//! `entities.tsv`. Missing optional files are treated as empty, matching
//! the tolerant style of this codebase's `til` section readers, which
//! skip absent optional subsections rather than erroring.

use std::collections::HashMap;
use std::path::Path;

use crate::codec::text::{CodecEntry, TextCodec};
use crate::codec::TypeRegistry;
use crate::error::{Result, RomError};
use crate::schema::bitfield_def::BitfieldDef;
use crate::schema::entity_def::EntityDef;
use crate::schema::enum_def::EnumDef;
use crate::schema::field::{Display, Field, Origin, Reference};
use crate::schema::struct_def::StructDef;
use crate::schema::table_def::TableDef;
use crate::schema::{RomMeta, Schema};
use crate::tsv;

impl Schema {
    pub fn load(map_dir: &Path) -> Result<Schema> {
        let meta = load_meta(map_dir)?;
        let mut schema = Schema::new(meta, TypeRegistry::with_builtins());

        load_enums(map_dir, &mut schema)?;
        load_codecs(map_dir, &mut schema)?;
        load_structs_and_bitfields(map_dir, &mut schema)?;
        load_tables(map_dir, &mut schema)?;
        resolve_struct_references(&mut schema)?;
        load_entities(map_dir, &mut schema)?;
        Ok(schema)
    }
}

fn read_optional(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(RomError::Io(err)),
    }
}

fn tsv_files_in(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().map(|ext| ext == "tsv").unwrap_or(false))
        .collect();
    paths.sort();
    Ok(paths)
}

fn load_meta(map_dir: &Path) -> Result<RomMeta> {
    let text = read_optional(&map_dir.join("rom.tsv"))?;
    let mut kv: HashMap<String, String> = HashMap::new();
    for row in tsv::parse_rows(&text) {
        if let [key, value] = row.as_slice() {
            kv.insert(key.clone(), value.clone());
        }
    }
    Ok(RomMeta {
        name: kv.get("name").cloned().unwrap_or_default(),
        size: kv.get("size").and_then(|s| s.parse().ok()),
        sha1: kv.get("sha1").cloned(),
        map_version: kv.get("map_version").cloned().unwrap_or_default(),
        header_len: kv.get("header_len").and_then(|s| s.parse().ok()).unwrap_or(0),
    })
}

fn load_enums(map_dir: &Path, schema: &mut Schema) -> Result<()> {
    for path in tsv_files_in(&map_dir.join("enums"))? {
        let name = file_stem(&path)?;
        let text = std::fs::read_to_string(&path)?;
        let mut members = Vec::new();
        for record in tsv::parse_records(&text) {
            let value: i64 = record
                .get("value")
                .ok_or_else(|| RomError::SchemaError(format!("enum `{name}` row missing `value`")))?
                .parse()
                .map_err(|_| RomError::SchemaError(format!("enum `{name}` has a non-integer value")))?;
            let member_name = record
                .get("name")
                .ok_or_else(|| RomError::SchemaError(format!("enum `{name}` row missing `name`")))?
                .clone();
            members.push((value, member_name));
        }
        schema.enums.insert(name.clone(), EnumDef::new(name, members)?);
    }
    Ok(())
}

fn load_codecs(map_dir: &Path, schema: &mut Schema) -> Result<()> {
    let dir = map_dir.join("codecs");
    if !dir.exists() {
        return Ok(());
    }
    let mut paths: Vec<_> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "tbl").unwrap_or(false))
        .collect();
    paths.sort();
    for path in paths {
        let name = file_stem(&path)?;
        let text = std::fs::read_to_string(&path)?;
        let mut entries = Vec::new();
        let mut terminator = Vec::new();
        for record in tsv::parse_records(&text) {
            let bytes_hex = record
                .get("bytes")
                .ok_or_else(|| RomError::SchemaError(format!("codec `{name}` row missing `bytes`")))?;
            let bytes = parse_hex_bytes(bytes_hex)?;
            let ch = record
                .get("char")
                .ok_or_else(|| RomError::SchemaError(format!("codec `{name}` row missing `char`")))?
                .clone();
            if ch == "\\0" || ch.eq_ignore_ascii_case("<end>") {
                terminator = bytes;
            } else {
                entries.push(CodecEntry { bytes, text: unescape(&ch) });
            }
        }
        let codec = TextCodec::new(name.clone(), entries, terminator)?;
        schema.codecs.insert(name, codec);
    }
    Ok(())
}

fn unescape(text: &str) -> String {
    // Codec tables spell a literal tab/newline character as `\t`/`\n`;
    // everything else passes through unchanged (including `\xNN`, which
    // the codec only ever produces, never consumes, as input text).
    text.replace("\\t", "\t").replace("\\n", "\n")
}

fn parse_hex_bytes(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(RomError::SchemaError(format!("`{text}` has an odd number of hex digits")));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| RomError::SchemaError(format!("`{text}` is not hex")))
        })
        .collect()
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| RomError::SchemaError(format!("`{}` has no usable file stem", path.display())))
}

/// A struct field's `type` column may itself name a bitfield (a letter
/// string like `abcdefgh`) rather than a primitive or struct name. This is
/// detected by the presence of a `flags` column on the same row; bitfields
/// compiled this way are registered under a synthetic name derived from
/// the owning struct and field so each stays independently addressable.
fn load_structs_and_bitfields(map_dir: &Path, schema: &mut Schema) -> Result<()> {
    for path in tsv_files_in(&map_dir.join("structs"))? {
        let struct_name = file_stem(&path)?;
        let text = std::fs::read_to_string(&path)?;
        let mut fields = Vec::new();
        for record in tsv::parse_records(&text) {
            let get = |col: &str| record.get(col).cloned().unwrap_or_default();
            let name = get("name");
            if name.is_empty() {
                continue;
            }
            let type_name = get("type");
            let offset_bits: u64 = get("offset")
                .parse()
                .map_err(|_| RomError::SchemaError(format!("struct `{struct_name}` field `{name}`: bad offset")))?;
            let size_bits: u32 = get("size")
                .parse()
                .map_err(|_| RomError::SchemaError(format!("struct `{struct_name}` field `{name}`: bad size")))?;
            let origin = match get("origin").as_str() {
                "" => Origin::Parent,
                other => Origin::parse(other)?,
            };
            let reference = match get("ref").as_str() {
                "" => None,
                other => Some(if schema.enums.contains_key(other) {
                    Reference::Enum(other.to_string())
                } else {
                    Reference::Table(other.to_string())
                }),
            };
            let display = Display::parse(&get("display"))?;
            let optional = get("optional") == "1" || get("optional").eq_ignore_ascii_case("true");
            let flags = get("flags");
            let final_type_name = if !flags.is_empty() {
                let bitfield_name = format!("{struct_name}.{name}");
                schema
                    .bitfields
                    .insert(bitfield_name.clone(), BitfieldDef::from_mnemonics(&bitfield_name, &flags));
                schema.types.register_bitfield(&bitfield_name);
                bitfield_name
            } else {
                type_name
            };
            fields.push(Field {
                id: get("id"),
                name,
                type_name: final_type_name,
                offset_bits,
                size_bits,
                origin,
                reference,
                display,
                optional,
                comment: get("comment"),
            });
        }
        schema.structs.insert(struct_name.clone(), StructDef::new(struct_name, fields)?);
    }
    Ok(())
}

/// Struct fields whose `ref` column is ambiguous at load time (an enum and
/// a table sharing a name, or a forward reference to a table declared
/// later in `tables.tsv`) are re-checked once every table is known.
fn resolve_struct_references(schema: &mut Schema) -> Result<()> {
    let table_names: std::collections::HashSet<String> =
        schema.tables.values().map(|t| t.id.clone()).collect();
    for def in schema.structs.values_mut() {
        for field in &mut def.fields {
            if let Some(Reference::Table(id)) = &field.reference {
                if !table_names.contains(id) && !schema.enums.contains_key(id) {
                    return Err(RomError::SchemaError(format!(
                        "field `{}` references unknown table or enum `{id}`",
                        field.name
                    )));
                }
            }
        }
    }
    Ok(())
}

fn load_tables(map_dir: &Path, schema: &mut Schema) -> Result<()> {
    let text = read_optional(&map_dir.join("tables.tsv"))?;
    for record in tsv::parse_records(&text) {
        let get = |col: &str| record.get(col).cloned().unwrap_or_default();
        let id = get("id");
        if id.is_empty() {
            continue;
        }
        let index = get("index");
        let (stride_bytes, index_table_id) = if index.is_empty() {
            let stride: u32 = get("stride")
                .parse()
                .map_err(|_| RomError::SchemaError(format!("table `{id}`: bad stride")))?;
            (Some(stride), None)
        } else {
            (None, Some(index))
        };
        let zero_adjustment = get("zero_adjustment").parse().unwrap_or(0);
        schema.tables.insert(
            id.clone(),
            TableDef {
                id,
                name: get("name"),
                type_name: get("type"),
                offset_bytes: get("offset").parse().map_err(|_| RomError::SchemaError("bad table offset".into()))?,
                count: get("count").parse().map_err(|_| RomError::SchemaError("bad table count".into()))?,
                stride_bytes,
                index_table_id,
                zero_adjustment,
                comment: get("comment"),
            },
        );
    }
    Ok(())
}

fn load_entities(map_dir: &Path, schema: &mut Schema) -> Result<()> {
    let text = read_optional(&map_dir.join("entities.tsv"))?;
    for record in tsv::parse_records(&text) {
        let name = record.get("name").cloned().unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let table_ids: Vec<String> = record
            .get("tables")
            .map(|s| s.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect())
            .unwrap_or_default();
        schema.entities.push(EntityDef::new(name, table_ids)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Value;
    use crate::rom::Rom;

    fn write_file(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    /// A struct field declared with a `flags` column compiles to a
    /// synthetic bitfield type that must be readable and writable like any
    /// other field — not just usable as a standalone `BitfieldDef`.
    #[test]
    fn bitfield_struct_field_is_readable_and_writable() {
        let marker = 0u8;
        let dir = std::env::temp_dir().join(format!("romtool-loader-bitfield-test-{:p}", &marker));

        write_file(
            &dir,
            "structs/Monster.tsv",
            "name\ttype\toffset\tsize\tflags\nability_flags\tuint\t0\t8\tabcdefgh\n",
        );
        write_file(
            &dir,
            "tables.tsv",
            "id\tname\ttype\toffset\tcount\tstride\nmonsters\tMonsters\tMonster\t0\t1\t1\n",
        );
        write_file(&dir, "entities.tsv", "name\ttables\nmonsters\tmonsters\n");

        let schema = Schema::load(&dir).unwrap();
        assert!(schema.types.get("Monster.ability_flags").is_ok());

        let mut rom = Rom::new(schema, vec![0u8; 1], true);
        let entity = rom.schema.entities[0].clone();
        let bits = rom.schema.bitfields["Monster.ability_flags"].parse("ace").unwrap();
        rom.write_entity_field(&entity, 0, "ability_flags", Value::Bits(bits)).unwrap();
        assert_eq!(rom.bytes()[0], 0x15);
        assert_eq!(rom.render_entity_field(&entity, 0, "ability_flags").unwrap(), "ace");

        std::fs::remove_dir_all(&dir).ok();
    }
}
