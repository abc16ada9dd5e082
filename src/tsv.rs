//! Tab-separated value plumbing: a tiny, dependency-free parser/writer
//! shared by the map loader (`schema::loader`) and the entity dump/load
//! engine below. Grounded in this codebase's habit of hand rolling small
//! format-specific parsers (`src/tools/dump_id0.rs`) rather than pulling
//! in a crate for a one-screen job.

use std::collections::HashMap;

use crate::error::{Result, RomError};
use crate::rom::Rom;
use crate::schema::entity_def::EntityDef;

pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

pub fn write_rows(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
    out
}

/// Parses a TSV whose first row is a header, into one ordered map per
/// subsequent row. Rows shorter than the header leave trailing columns
/// empty rather than erroring, matching the loader's general tolerance of
/// missing optional data.
pub fn parse_records(text: &str) -> Vec<HashMap<String, String>> {
    let rows = parse_rows(text);
    let Some((header, body)) = rows.split_first() else {
        return Vec::new();
    };
    body.iter()
        .map(|row| {
            header
                .iter()
                .enumerate()
                .map(|(i, col)| (col.clone(), row.get(i).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}

/// Renders one `<entity>.tsv`: header row of joined field display names,
/// one body row per index. Cross-reference fields render under the
/// referencing field's own name, not the target entity's.
pub fn render_entity(rom: &Rom, entity: &EntityDef) -> Result<String> {
    let columns = rom.entity_columns(entity)?;
    let mut rows = vec![columns.clone()];
    let row_count = rom.entity_row_count(entity)?;
    for index in 0..row_count {
        let mut row = Vec::with_capacity(columns.len());
        for column in &columns {
            match rom.render_entity_field(entity, index, column) {
                Ok(text) => row.push(text),
                Err(err) if err.is_dump_warning() => {
                    log::warn!("entity `{}` row {index} column `{column}`: {err}", entity.name);
                    row.push(String::new());
                }
                Err(err) => return Err(err),
            }
        }
        rows.push(row);
    }
    Ok(write_rows(&rows))
}

/// Parses a `<entity>.tsv` back into field writes applied to `rom`. Every
/// cell is parsed before any write is attempted, so a single
/// `UnparseableValue` aborts before any byte is touched; a `ValueOverflow`
/// surfacing later, during the write pass itself, restores the buffer to
/// its pre-call state before returning the error.
pub fn load_entity(rom: &mut Rom, entity: &EntityDef, text: &str) -> Result<()> {
    // Names are indexed from the incoming text before anything is parsed,
    // so renaming this entity's own rows and referencing the new name in
    // the same file resolves correctly. `Rom::load` does the same thing
    // across every entity in a directory at once, ahead of parsing any of
    // them, so cross-entity renames resolve the same way.
    rom.index_entity_names_from_text(entity, text)?;
    let records = parse_records(text);
    let mut parsed = Vec::with_capacity(records.len());
    for (row_index, record) in records.iter().enumerate() {
        let mut row_values = Vec::with_capacity(record.len());
        for (column, text) in record {
            let value = rom
                .parse_entity_field(entity, column, text)
                .map_err(|err| match err {
                    RomError::SchemaError(detail) => RomError::UnparseableValue {
                        row: row_index,
                        column: column.clone(),
                        detail,
                    },
                    other => other,
                })?;
            row_values.push((column.clone(), value));
        }
        parsed.push(row_values);
    }
    let backup = rom.bytes().to_vec();
    for (index, row_values) in parsed.into_iter().enumerate() {
        for (column, value) in row_values {
            if let Err(err) = rom.write_entity_field(entity, index, &column, value) {
                rom.bytes_mut().copy_from_slice(&backup);
                return Err(err);
            }
        }
    }
    Ok(())
}
