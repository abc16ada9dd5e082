//! Byte <-> character translation tables.
//!
//! Grounded on `src/tools/dump_id0.rs::id0_to_str`, which already escapes
//! unprintable bytes as `\xNN`; here that escape becomes the codec's
//! fallback for any byte the table doesn't cover, so decode never fails.

use std::collections::BTreeMap;

use crate::error::{Result, RomError};

/// A single entry loaded from a `codecs/*.tbl` file: a byte sequence
/// (usually one byte, but the table format allows multi-byte sequences)
/// paired with the character(s) it represents.
#[derive(Debug, Clone)]
pub struct CodecEntry {
    pub bytes: Vec<u8>,
    pub text: String,
}

/// Greedy-longest-match byte<->text table with a configurable terminator
/// sequence and a bit-exact hex-escape fallback for unmapped bytes.
#[derive(Debug, Clone)]
pub struct TextCodec {
    name: String,
    decode_table: BTreeMap<Vec<u8>, String>,
    encode_table: BTreeMap<String, Vec<u8>>,
    max_entry_len: usize,
    terminator: Vec<u8>,
    pad_byte: u8,
}

impl TextCodec {
    pub fn new(name: impl Into<String>, entries: Vec<CodecEntry>, terminator: Vec<u8>) -> Result<Self> {
        let mut decode_table = BTreeMap::new();
        let mut encode_table = BTreeMap::new();
        let mut max_entry_len = 1;
        for entry in entries {
            max_entry_len = max_entry_len.max(entry.bytes.len());
            decode_table.insert(entry.bytes.clone(), entry.text.clone());
            encode_table.insert(entry.text, entry.bytes);
        }
        Ok(Self {
            name: name.into(),
            decode_table,
            encode_table,
            max_entry_len,
            terminator,
            pad_byte: 0x00,
        })
    }

    /// A plain identity (ASCII passthrough) codec, used by tests and as a
    /// sane default when a map declares no `codecs/*.tbl` file.
    pub fn ascii_with_terminator(terminator: Vec<u8>) -> Self {
        Self {
            name: "ascii".into(),
            decode_table: BTreeMap::new(),
            encode_table: BTreeMap::new(),
            max_entry_len: 1,
            terminator,
            pad_byte: 0x00,
        }
    }

    pub fn terminator(&self) -> &[u8] {
        &self.terminator
    }

    pub fn pad_byte(&self) -> u8 {
        self.pad_byte
    }

    pub fn set_pad_byte(&mut self, pad: u8) {
        self.pad_byte = pad;
    }

    /// Decodes a fixed-length byte span. Trailing padding after the first
    /// escape-free run is preserved bit-exactly by round-tripping through
    /// the same escape grammar, so `encode(decode(bytes)) == bytes`.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        let mut out = String::new();
        let mut i = 0;
        while i < bytes.len() {
            if let Some((text, len)) = self.longest_match(&bytes[i..]) {
                out.push_str(&text);
                i += len;
            } else {
                out.push_str(&format!("\\x{:02X}", bytes[i]));
                i += 1;
            }
        }
        Ok(out)
    }

    /// Decodes from the start of `bytes` until the terminator sequence is
    /// found (inclusive of the terminator in the consumed length); returns
    /// the decoded text (terminator excluded) and the number of raw bytes
    /// consumed.
    pub fn decode_terminated(&self, bytes: &[u8]) -> Result<(String, usize)> {
        if self.terminator.is_empty() {
            return Err(RomError::SchemaError(format!(
                "codec `{}` has no terminator, cannot be used as strz",
                self.name
            )));
        }
        let mut out = String::new();
        let mut i = 0;
        loop {
            if bytes[i..].starts_with(&self.terminator[..]) {
                return Ok((out, i + self.terminator.len()));
            }
            if i >= bytes.len() {
                return Err(RomError::OutOfBounds {
                    offset: (i as u64) * 8,
                    width: 0,
                    buffer_len: bytes.len(),
                });
            }
            if let Some((text, len)) = self.longest_match(&bytes[i..]) {
                out.push_str(&text);
                i += len;
            } else {
                out.push_str(&format!("\\x{:02X}", bytes[i]));
                i += 1;
            }
        }
    }

    fn longest_match(&self, bytes: &[u8]) -> Option<(String, usize)> {
        let max = self.max_entry_len.min(bytes.len());
        for len in (1..=max).rev() {
            if let Some(text) = self.decode_table.get(&bytes[..len]) {
                return Some((text.clone(), len));
            }
        }
        None
    }

    /// Encodes text back to bytes, inverting [`TextCodec::decode`]
    /// including `\xNN` escapes.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '\\' && i + 3 < chars.len() && chars[i + 1] == 'x' {
                let hex: String = chars[i + 2..i + 4].iter().collect();
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
            // try the longest encode-table key matching the remaining text
            let mut matched = false;
            let remaining: String = chars[i..].iter().collect();
            let mut candidates: Vec<&String> = self.encode_table.keys().collect();
            candidates.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));
            for key in candidates {
                if remaining.starts_with(key.as_str()) && !key.is_empty() {
                    out.extend_from_slice(&self.encode_table[key]);
                    i += key.chars().count();
                    matched = true;
                    break;
                }
            }
            if !matched {
                return Err(RomError::InvalidEncoding {
                    codec: self.name.clone(),
                    detail: format!("no mapping for character {:?}", chars[i]),
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_codec() -> TextCodec {
        TextCodec::new(
            "sample",
            vec![
                CodecEntry { bytes: vec![0x41], text: "A".into() },
                CodecEntry { bytes: vec![0x42], text: "B".into() },
            ],
            vec![0xFF],
        )
        .unwrap()
    }

    #[test]
    fn round_trips_known_and_escaped_bytes() {
        let codec = sample_codec();
        let bytes = [0x41, 0x42, 0x99];
        let text = codec.decode(&bytes).unwrap();
        assert_eq!(text, "AB\\x99");
        let back = codec.encode(&text).unwrap();
        assert_eq!(back, bytes);
    }

    #[test]
    fn decode_terminated_stops_at_terminator() {
        let codec = sample_codec();
        let bytes = [0x41, 0x42, 0xFF, 0x41];
        let (text, consumed) = codec.decode_terminated(&bytes).unwrap();
        assert_eq!(text, "AB");
        assert_eq!(consumed, 3);
    }
}
