//! IPST: the line-oriented textual rendering of an IPS patch. First line
//! `PATCH`, last line `EOF`. Each record line is either
//! `OOOOOO:LLLL:HEXBYTES` (literal) or `OOOOOO:0000:LLLL:BB:R` (RLE). `R` is
//! `1` when the record was RLE-encoded in the binary IPS it came from, `0`
//! when it was a literal run of identical bytes rendered here in the
//! `0000` display form. `O`/`L` are uppercase hex of the stated widths.
//! Blank lines and `#`-prefixed lines are comments, ignored on read.

use super::{Frame, Patch};
use crate::error::{Result, RomError};

const RLE_MIN_RUN: usize = 4;

/// Renders `patch` as IPST text. When `patch` carries frames from a prior
/// decode, each frame is replayed with its original offset, length and `R`
/// choice rather than re-derived, so `from_ips(x).to_ipst()` preserves the
/// literal/RLE shape of every record in `x`.
pub fn encode(patch: &Patch) -> String {
    let mut out = String::new();
    out.push_str("PATCH\n");
    if let Some(frames) = patch.frames() {
        for frame in frames {
            emit_frame(&mut out, patch, frame);
        }
    } else {
        let edits: Vec<(u32, u8)> = patch.iter().collect();
        let mut i = 0;
        while i < edits.len() {
            let mut j = i + 1;
            while j < edits.len() && edits[j].0 == edits[j - 1].0 + 1 {
                j += 1;
            }
            emit_run(&mut out, &edits[i..j]);
            i = j;
        }
    }
    out.push_str("EOF\n");
    out
}

fn emit_frame(out: &mut String, patch: &Patch, frame: &Frame) {
    if frame.rle {
        let value = patch.get(frame.offset).unwrap_or(0);
        out.push_str(&format!("{:06X}:0000:{:04X}:{:02X}:1\n", frame.offset, frame.len, value));
    } else {
        let hex: String = (0..frame.len)
            .map(|i| format!("{:02X}", patch.get(frame.offset + i).unwrap_or(0)))
            .collect();
        out.push_str(&format!("{:06X}:{:04X}:{hex}\n", frame.offset, frame.len));
    }
}

fn emit_run(out: &mut String, run: &[(u32, u8)]) {
    let mut k = 0;
    while k < run.len() {
        let offset = run[k].0;
        let mut rle_len = 1usize;
        while k + rle_len < run.len() && run[k + rle_len].1 == run[k].1 && rle_len < 0xFFFF {
            rle_len += 1;
        }
        if rle_len >= RLE_MIN_RUN {
            out.push_str(&format!("{offset:06X}:0000:{rle_len:04X}:{:02X}:1\n", run[k].1));
            k += rle_len;
            continue;
        }
        let mut len = 1usize;
        while k + len < run.len() && len < 0xFFFF {
            let rest = &run[k + len..];
            if rest.len() >= RLE_MIN_RUN && rest[..RLE_MIN_RUN].iter().all(|&(_, v)| v == rest[0].1) {
                break;
            }
            len += 1;
        }
        let hex: String = run[k..k + len].iter().map(|&(_, v)| format!("{v:02X}")).collect();
        out.push_str(&format!("{offset:06X}:{len:04X}:{hex}\n"));
        k += len;
    }
}

/// Parses IPST text. Each RLE line's trailing `R` digit is kept as the
/// frame's `rle` flag — `R=1` means the record was originally RLE-encoded
/// in binary IPS, `R=0` means it was a literal run of identical bytes that
/// only happens to use the `0000`-length display form — so re-encoding to
/// binary IPS (via `to_ips`) reproduces the original record shape rather
/// than always choosing RLE for any same-byte run.
pub fn decode(text: &str) -> Result<Patch> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#'));
    match lines.next() {
        Some("PATCH") => {}
        _ => return Err(RomError::PatchFormatError("missing PATCH header line".into())),
    }
    let mut edits = std::collections::BTreeMap::new();
    let mut frames = Vec::new();
    for line in lines {
        if line == "EOF" {
            return Ok(Patch::from_edits_with_frames(edits, frames));
        }
        let fields: Vec<&str> = line.split(':').collect();
        let offset = parse_hex_u32(fields.first().copied(), line)?;
        let length_field = fields.get(1).copied().unwrap_or_default();
        if length_field == "0000" {
            let run_len = parse_hex_u32(fields.get(2).copied(), line)? as usize;
            let value = parse_hex_u8(fields.get(3).copied(), line)?;
            let r_field = fields.get(4).copied().ok_or_else(|| {
                RomError::PatchFormatError(format!("RLE record `{line}` is missing its R flag"))
            })?;
            let rle = match r_field {
                "1" => true,
                "0" => false,
                other => {
                    return Err(RomError::PatchFormatError(format!(
                        "RLE record `{line}` has invalid R flag `{other}`"
                    )))
                }
            };
            for i in 0..run_len {
                edits.insert(offset + i as u32, value);
            }
            frames.push(Frame { offset, len: run_len as u32, rle });
        } else {
            let length = parse_hex_u32(fields.get(1).copied(), line)? as usize;
            let hex = fields.get(2).copied().unwrap_or_default();
            if hex.len() != length * 2 {
                return Err(RomError::PatchFormatError(format!(
                    "record `{line}` declares length {length} but carries {} hex digits",
                    hex.len()
                )));
            }
            for i in 0..length {
                let byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                    .map_err(|_| RomError::PatchFormatError(format!("record `{line}` has non-hex payload")))?;
                edits.insert(offset + i as u32, byte);
            }
            frames.push(Frame { offset, len: length as u32, rle: false });
        }
    }
    Err(RomError::PatchFormatError("missing EOF footer line".into()))
}

fn parse_hex_u32(field: Option<&str>, line: &str) -> Result<u32> {
    let field = field.ok_or_else(|| RomError::PatchFormatError(format!("record `{line}` is missing a field")))?;
    u32::from_str_radix(field, 16)
        .map_err(|_| RomError::PatchFormatError(format!("`{field}` in record `{line}` is not hex")))
}

fn parse_hex_u8(field: Option<&str>, line: &str) -> Result<u8> {
    let field = field.ok_or_else(|| RomError::PatchFormatError(format!("record `{line}` is missing a field")))?;
    u8::from_str_radix(field, 16)
        .map_err(|_| RomError::PatchFormatError(format!("`{field}` in record `{line}` is not hex")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_literal_patch() {
        let mut raw = std::collections::BTreeMap::new();
        raw.insert(0x10, 0xAA);
        raw.insert(0x11, 0xBB);
        raw.insert(0x20, 0xCC);
        let patch = Patch::from_edits(raw);
        let text = encode(&patch);
        assert!(text.starts_with("PATCH\n"));
        assert!(text.trim_end().ends_with("EOF"));
        assert_eq!(decode(&text).unwrap(), patch);
    }

    #[test]
    fn round_trips_an_rle_run() {
        let edits: std::collections::BTreeMap<u32, u8> = (0x100..0x110).map(|o| (o, 0x5A)).collect();
        let patch = Patch::from_edits(edits);
        let text = encode(&patch);
        assert!(text.contains(":0000:"));
        assert_eq!(decode(&text).unwrap(), patch);
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let text = "PATCH\n# a comment\n\n000010:0002:0102\nEOF\n";
        let patch = decode(text).unwrap();
        assert_eq!(patch.get(0x10), Some(0x01));
        assert_eq!(patch.get(0x11), Some(0x02));
    }

    #[test]
    fn rejects_a_missing_header() {
        assert!(matches!(decode("000010:0002:0102\nEOF\n"), Err(RomError::PatchFormatError(_))));
    }
}
